//! TUI widgets for the chat simulator

pub mod banner;
pub mod call;
pub mod chat_list;
pub mod confetti;
pub mod conversation;
pub mod options;
pub mod status_bar;

pub use banner::BannerWidget;
pub use call::CallWidget;
pub use chat_list::ChatListWidget;
pub use confetti::ConfettiWidget;
pub use conversation::ConversationWidget;
pub use options::OptionsWidget;
pub use status_bar::{HotkeyBarWidget, StatusBarWidget};
