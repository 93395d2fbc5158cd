//! Confetti animation widget

use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

use chatsim_core::notify::Particle;

/// Falling emoji for a short celebration.
pub struct ConfettiWidget<'a> {
    particles: &'a [Particle],
    frame: u8,
}

impl<'a> ConfettiWidget<'a> {
    pub fn new(particles: &'a [Particle], frame: u8) -> Self {
        Self { particles, frame }
    }
}

/// Row of a particle at `frame`, staggered by its id.
pub fn particle_row(particle: &Particle, frame: u8, height: u16) -> u16 {
    if height == 0 {
        return 0;
    }
    let offset = (particle.id % 7) as u16 * 2;
    (frame as u16 + offset) % height
}

/// Column for a horizontal percentage of `width`.
pub fn particle_column(particle: &Particle, width: u16) -> u16 {
    (u32::from(width) * u32::from(particle.x_percent) / 100) as u16
}

impl Widget for ConfettiWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for particle in self.particles {
            let x = area.x + particle_column(particle, area.width).min(area.width.saturating_sub(2));
            let y = area.y + particle_row(particle, self.frame, area.height);
            if x < area.right() && y < area.bottom() {
                buf.set_string(x, y, particle.emoji, ratatui::style::Style::default());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(id: u64, x_percent: u8) -> Particle {
        Particle {
            id,
            x_percent,
            emoji: "🎉",
        }
    }

    #[test]
    fn test_particles_stay_inside_area() {
        for frame in 0..=u8::MAX {
            let row = particle_row(&particle(3, 50), frame, 10);
            assert!(row < 10);
        }
        assert_eq!(particle_column(&particle(0, 90), 100), 90);
        assert_eq!(particle_row(&particle(0, 10), 5, 0), 0);
    }
}
