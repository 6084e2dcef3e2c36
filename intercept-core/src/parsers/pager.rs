//! POCSAG and FLEX line decoding, spec.md §4.6/§8.

use crate::models::{MessageType, PagerMessage, PagerProtocol};
use once_cell::sync::Lazy;
use regex::Regex;

static POCSAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^POCSAG(?P<rate>\d+):\s*
        Address:\s*(?P<address>\d+)\s+
        Function:\s*(?P<function>\d+)
        (?:\s+(?P<kind>Alpha|Numeric):\s*(?P<body>.*))?
        \s*$",
    )
    .expect("static pocsag regex")
});

static FLEX_FULL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^FLEX[:|]\s*
        (?P<date>\d{4}-\d{2}-\d{2})\s+
        (?P<time>\d{2}:\d{2}:\d{2})\s+
        (?P<frame>\S+)\s+
        (?P<baud>[\d.]+)\s+
        (?:\[(?P<capcode>\d+)\]\s+)?
        (?P<level>\S+)\s+
        (?P<text>.*)
        $",
    )
    .expect("static flex regex")
});

static FLEX_DEGENERATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^FLEX[:|]\s*(?P<text>.*)$").expect("static flex-degenerate regex"));

fn pocsag_protocol(rate: &str) -> Option<PagerProtocol> {
    match rate {
        "512" => Some(PagerProtocol::Pocsag512),
        "1200" => Some(PagerProtocol::Pocsag1200),
        "2400" => Some(PagerProtocol::Pocsag2400),
        _ => None,
    }
}

fn flex_level_to_msg_type(level: &str) -> MessageType {
    match level.to_uppercase().as_str() {
        "ALN" => MessageType::Aln,
        "NUM" => MessageType::Numeric,
        "TONE" => MessageType::Tone,
        _ => MessageType::Alpha,
    }
}

/// Parses one line of `multimon-ng -t POCSAG -a` output, or `None` if the
/// line is not a recognized POCSAG message.
pub fn parse_pocsag_line(line: &str, timestamp: &str) -> Option<PagerMessage> {
    let caps = POCSAG_RE.captures(line.trim())?;
    let protocol = pocsag_protocol(&caps["rate"])?;
    let address = caps["address"].to_string();
    let function = caps["function"].to_string();

    let (msg_type, message) = match (caps.name("kind"), caps.name("body")) {
        (Some(kind), Some(body)) => {
            let msg_type = if kind.as_str() == "Alpha" {
                MessageType::Alpha
            } else {
                MessageType::Numeric
            };
            (msg_type, body.as_str().trim().to_string())
        }
        _ => (MessageType::Tone, "[Tone Only]".to_string()),
    };

    Some(PagerMessage {
        protocol,
        address,
        function,
        msg_type,
        message,
        timestamp: timestamp.to_string(),
    })
}

/// Parses one line of FLEX decoder output, falling back to the degenerate
/// `FLEX: <text>` form when the fully-structured pattern does not match.
pub fn parse_flex_line(line: &str, timestamp: &str) -> Option<PagerMessage> {
    let trimmed = line.trim();

    if let Some(caps) = FLEX_FULL_RE.captures(trimmed) {
        let address = caps
            .name("capcode")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let msg_type = flex_level_to_msg_type(&caps["level"]);
        return Some(PagerMessage {
            protocol: PagerProtocol::Flex,
            address,
            function: "0".to_string(),
            msg_type,
            message: caps["text"].trim().to_string(),
            timestamp: timestamp.to_string(),
        });
    }

    let caps = FLEX_DEGENERATE_RE.captures(trimmed)?;
    Some(PagerMessage {
        protocol: PagerProtocol::Flex,
        address: String::new(),
        function: "0".to_string(),
        msg_type: MessageType::Alpha,
        message: caps["text"].trim().to_string(),
        timestamp: timestamp.to_string(),
    })
}

/// Dispatches a decoder line to whichever format it matches.
pub fn parse_line(line: &str, timestamp: &str) -> Option<PagerMessage> {
    if line.trim_start().starts_with("FLEX") {
        parse_flex_line(line, timestamp)
    } else {
        parse_pocsag_line(line, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pocsag_alpha_with_body() {
        let msg = parse_pocsag_line(
            "POCSAG1200: Address: 1234567  Function: 0  Alpha: HELLO WORLD",
            "12:00:00",
        )
        .unwrap();
        assert_eq!(msg.protocol, PagerProtocol::Pocsag1200);
        assert_eq!(msg.address, "1234567");
        assert_eq!(msg.function, "0");
        assert_eq!(msg.msg_type, MessageType::Alpha);
        assert_eq!(msg.message, "HELLO WORLD");
    }

    #[test]
    fn pocsag_tone_only() {
        let msg = parse_pocsag_line("POCSAG512: Address: 42  Function: 1", "12:00:00").unwrap();
        assert_eq!(msg.protocol, PagerProtocol::Pocsag512);
        assert_eq!(msg.msg_type, MessageType::Tone);
        assert_eq!(msg.message, "[Tone Only]");
    }

    #[test]
    fn flex_full_form() {
        let msg = parse_flex_line(
            "FLEX: 2025-01-02 03:04:05 1234/5/A 1600.000 [9876543] ALN Hi",
            "03:04:05",
        )
        .unwrap();
        assert_eq!(msg.protocol, PagerProtocol::Flex);
        assert_eq!(msg.address, "9876543");
        assert_eq!(msg.msg_type, MessageType::Aln);
        assert_eq!(msg.message, "Hi");
    }

    #[test]
    fn flex_pipe_delimited() {
        let msg = parse_flex_line(
            "FLEX| 2025-01-02 03:04:05 1234/5/A 1600.000 [42] NUM 007",
            "03:04:05",
        )
        .unwrap();
        assert_eq!(msg.msg_type, MessageType::Numeric);
        assert_eq!(msg.address, "42");
    }

    #[test]
    fn flex_degenerate_form() {
        let msg = parse_flex_line("FLEX: just some text", "03:04:05").unwrap();
        assert_eq!(msg.address, "");
        assert_eq!(msg.message, "just some text");
    }

    #[test]
    fn non_matching_line_is_none() {
        assert!(parse_pocsag_line("garbage line", "00:00:00").is_none());
    }
}
