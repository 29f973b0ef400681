//! Minimal Telnet filtering.
//!
//! The node side of a packet-radio BBS speaks just enough Telnet to be
//! annoying: option negotiation we never want, subnegotiation payloads we
//! never read, and 0xFF escaping in both directions. This module strips all
//! of it from the inbound stream, refuses every negotiation request, and
//! escapes outbound bytes so a literal 0xFF survives the wire.

use tracing::warn;

/// Telnet command bytes (IAC = Interpret As Command).
pub mod iac {
    /// IAC - Interpret As Command (255)
    pub const IAC: u8 = 255;

    /// DONT - Sender wants receiver to disable option (254)
    pub const DONT: u8 = 254;

    /// DO - Sender wants receiver to enable option (253)
    pub const DO: u8 = 253;

    /// WONT - Sender refuses to enable option (252)
    pub const WONT: u8 = 252;

    /// WILL - Sender wants to enable option (251)
    pub const WILL: u8 = 251;

    /// SB - Subnegotiation Begin (250)
    pub const SB: u8 = 250;

    /// SE - Subnegotiation End (240)
    pub const SE: u8 = 240;
}

/// Parser state, persisted across reads so a command sequence split over
/// two network chunks is handled identically to one arriving whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParserState {
    /// Plain data bytes.
    #[default]
    Data,
    /// Consumed an IAC, waiting for the command byte.
    SawIac,
    /// Consumed IAC DO/DONT/WILL/WONT, waiting for the option byte.
    ExpectOption,
    /// Inside an IAC SB ... payload.
    InSubneg,
    /// Saw an IAC inside a subnegotiation; IAC SE ends it.
    SubnegSawIac,
}

/// Inbound Telnet filter.
///
/// Feed it raw socket bytes; it returns the plain-data subset plus any
/// refusal replies that must be written back to the peer.
#[derive(Debug, Default)]
pub struct TelnetFilter {
    state: ParserState,
    /// Pending negotiation verb (DO/DONT/WILL/WONT) while in `ExpectOption`.
    cmd: u8,
}

impl TelnetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strip Telnet commands from `input`.
    ///
    /// Returns `(data, replies)`: `data` is the input with all protocol
    /// bytes removed (and `IAC IAC` unescaped to a single 0xFF), `replies`
    /// are refusal sequences to transmit to the peer.
    pub fn filter_inbound(&mut self, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::with_capacity(input.len());
        let mut replies = Vec::new();

        for &byte in input {
            match self.state {
                ParserState::Data => {
                    if byte == iac::IAC {
                        self.state = ParserState::SawIac;
                    } else {
                        data.push(byte);
                    }
                }
                ParserState::SawIac => match byte {
                    iac::IAC => {
                        // IAC IAC is an escaped literal 0xFF
                        data.push(iac::IAC);
                        self.state = ParserState::Data;
                    }
                    iac::DO | iac::DONT | iac::WILL | iac::WONT => {
                        self.cmd = byte;
                        self.state = ParserState::ExpectOption;
                    }
                    iac::SB => {
                        self.state = ParserState::InSubneg;
                    }
                    other => {
                        // NOP, GA, stray SE and friends: single-byte commands
                        if !matches!(other, iac::SE) {
                            warn!("ignoring telnet command IAC {:02X}", other);
                        }
                        self.state = ParserState::Data;
                    }
                },
                ParserState::ExpectOption => {
                    match self.cmd {
                        // We refuse every option the peer offers or requests
                        iac::DO => replies.extend_from_slice(&[iac::IAC, iac::WONT, byte]),
                        iac::WILL => replies.extend_from_slice(&[iac::IAC, iac::DONT, byte]),
                        // DONT/WONT acknowledge a refusal; nothing to say
                        _ => {}
                    }
                    self.state = ParserState::Data;
                }
                ParserState::InSubneg => {
                    if byte == iac::IAC {
                        self.state = ParserState::SubnegSawIac;
                    }
                    // Payload is discarded
                }
                ParserState::SubnegSawIac => {
                    self.state = if byte == iac::SE {
                        ParserState::Data
                    } else {
                        ParserState::InSubneg
                    };
                }
            }
        }

        (data, replies)
    }
}

/// Escape outbound bytes for the wire: every 0xFF is doubled so the peer's
/// filter reconstructs the literal byte. Applied before the line terminator.
pub fn escape_outbound(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        out.push(b);
        if b == iac::IAC {
            out.push(iac::IAC);
        }
    }
    out
}
