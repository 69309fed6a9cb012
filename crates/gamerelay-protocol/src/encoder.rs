//! Domain event → envelope conversion.

use std::sync::LazyLock;

use regex::Regex;

use crate::{Envelope, GameEvent};

/// Section-sign formatting codes: colors `0-9a-f`, styles `k-o`, reset
/// `r`, and the hex-color prefix `x`.
static FORMATTING_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)§[0-9a-fk-orx]").expect("pattern is a valid regex")
});

/// Removes color and style markup from chat or death text.
///
/// ```rust
/// use gamerelay_protocol::strip_formatting;
///
/// assert_eq!(strip_formatting("§aHello §lworld§r!"), "Hello world!");
/// ```
pub fn strip_formatting(text: &str) -> String {
    FORMATTING_CODE.replace_all(text, "").into_owned()
}

/// Converts a [`GameEvent`] into its canonical [`Envelope`].
///
/// Fills `type`, `player`, `uuid`, `time`, and for chat/death `message`
/// (never omitted, empty when the host gave none). The `token` is left
/// empty; the session layer owns it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventEncoder;

impl EventEncoder {
    pub fn encode(&self, event: &GameEvent) -> Envelope {
        let player = event.player();
        let message = match event {
            GameEvent::Chat { message, .. } => Some(strip_formatting(message)),
            GameEvent::Death { message, .. } => Some(
                message.as_deref().map(strip_formatting).unwrap_or_default(),
            ),
            GameEvent::Join { .. } | GameEvent::Quit { .. } => None,
        };

        Envelope {
            kind: event.kind().into(),
            token: String::new(),
            player: Some(player.name.clone()),
            uuid: Some(player.uuid),
            time: Some(event.occurred_at().timestamp_millis()),
            message,
        }
    }
}
