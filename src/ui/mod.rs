pub mod buttons;
pub mod embeds;
pub mod surface;
