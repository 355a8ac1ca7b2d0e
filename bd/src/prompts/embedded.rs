//! Embedded prompts
//!
//! Compiled into the binary from the `.hbs` files under `bd/prompts/`.

/// Conversational assistant prompt
pub const CHAT: &str = include_str!("../../prompts/chat.hbs");

/// Morning briefing prompt
pub const DAILY_BRIEFING: &str = include_str!("../../prompts/daily_briefing.hbs");

pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "chat" => Some(CHAT),
        "daily_briefing" => Some(DAILY_BRIEFING),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_embedded() {
        assert!(get_embedded("chat").unwrap().contains("gestor de negócios"));
        assert!(get_embedded("daily_briefing").unwrap().contains("briefing"));
        assert!(get_embedded("unknown-template").is_none());
    }
}
