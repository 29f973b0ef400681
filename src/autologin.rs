//! Autologin strategies and the input lock.
//!
//! A node either prints recognizable login prompts or it doesn't. The
//! prompt-triggered strategy reacts to markers in recently received text;
//! the blind-timed strategy fires on a fixed schedule from connect and is
//! used when the remote prompts are unreliable to match. Exactly one
//! strategy (or none) is selected at session start.
//!
//! While autologin is in flight the input lock suppresses transmission of
//! user-submitted lines; keystrokes still edit the command line. The lock
//! releases a fixed delay after login completes, or earlier when the recent
//! text looks like a command prompt and the line has gone quiet.

use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Delay from connect to the blind username send.
pub const BLIND_USER_DELAY: Duration = Duration::from_millis(150);

/// Delay from connect to the blind password send.
pub const BLIND_PASS_DELAY: Duration = Duration::from_millis(1000);

/// Maximum codepoints retained in the recent-text window.
const RECENT_LIMIT: usize = 8192;

const LOGIN_MARKERS: [&str; 3] = ["login:", "user:", "callsign:"];
const PASSWORD_MARKERS: [&str; 4] = ["password:", "pass:", "pw:", "enter password"];

/// Username and password for either strategy.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Prompt-triggered login progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    Idle,
    AwaitingPasswordPrompt,
    Done,
}

/// Reactive strategy: watch recent text for login/password prompts and
/// answer each exactly once. No retries, no timeout.
#[derive(Debug)]
pub struct PromptLogin {
    creds: Credentials,
    state: PromptState,
}

impl PromptLogin {
    pub fn new(creds: Credentials) -> Self {
        Self {
            creds,
            state: PromptState::Idle,
        }
    }

    pub fn state(&self) -> PromptState {
        self.state
    }

    /// Advance against the recent-text window. Returns the credential line
    /// to transmit, if a prompt matched.
    pub fn check(&mut self, recent: &str) -> Option<&str> {
        match self.state {
            PromptState::Idle => {
                if contains_any_ci(recent, &LOGIN_MARKERS) {
                    info!("login prompt detected, sending username");
                    self.state = PromptState::AwaitingPasswordPrompt;
                    return Some(&self.creds.username);
                }
            }
            PromptState::AwaitingPasswordPrompt => {
                if contains_any_ci(recent, &PASSWORD_MARKERS) {
                    info!("password prompt detected, sending password");
                    self.state = PromptState::Done;
                    return Some(&self.creds.password);
                }
            }
            PromptState::Done => {}
        }
        None
    }
}

/// Blind-timed login progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlindStage {
    Idle,
    SentUser,
    SentPass,
}

/// Time-driven strategy: username at `BLIND_USER_DELAY` after connect,
/// password at `BLIND_PASS_DELAY` after connect, independent of any
/// received text.
#[derive(Debug)]
pub struct BlindLogin {
    creds: Credentials,
    started: Instant,
    stage: BlindStage,
    pass_sent_at: Option<Instant>,
}

impl BlindLogin {
    pub fn new(creds: Credentials, started: Instant) -> Self {
        Self {
            creds,
            started,
            stage: BlindStage::Idle,
            pass_sent_at: None,
        }
    }

    pub fn stage(&self) -> BlindStage {
        self.stage
    }

    /// The moment the password went out, once it has.
    pub fn pass_sent_at(&self) -> Option<Instant> {
        self.pass_sent_at
    }

    /// Advance the schedule. Returns the credential line to transmit when a
    /// deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<&str> {
        let elapsed = now.saturating_duration_since(self.started);
        match self.stage {
            BlindStage::Idle if elapsed >= BLIND_USER_DELAY => {
                info!("blind autologin: sending username");
                self.stage = BlindStage::SentUser;
                Some(&self.creds.username)
            }
            BlindStage::SentUser if elapsed >= BLIND_PASS_DELAY => {
                info!("blind autologin: sending password");
                self.stage = BlindStage::SentPass;
                self.pass_sent_at = Some(now);
                Some(&self.creds.password)
            }
            _ => None,
        }
    }
}

/// The strategy selected for this session. Simultaneous strategies are
/// unrepresentable.
#[derive(Debug)]
pub enum Autologin {
    None,
    Prompt(PromptLogin),
    Blind(BlindLogin),
}

impl Autologin {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Autologin::None)
    }
}

/// Bounded trailing window of recently decoded inbound text, used for
/// prompt matching and the unlock heuristic.
#[derive(Debug, Default)]
pub struct RecentText {
    text: String,
}

impl RecentText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decoded text, trimming the front to stay within the cap.
    pub fn push(&mut self, chunk: &str) {
        self.text.push_str(chunk);
        let excess = self.text.chars().count().saturating_sub(RECENT_LIMIT);
        if excess > 0 {
            let cut = self
                .text
                .char_indices()
                .nth(excess)
                .map(|(i, _)| i)
                .unwrap_or(self.text.len());
            self.text.drain(..cut);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Gate on transmission of user-submitted lines.
///
/// Engaged whenever an autologin strategy is selected; keystrokes still
/// edit the command line while locked.
#[derive(Debug)]
pub struct InputLock {
    locked: bool,
    unlock_delay: Duration,
    quiet_period: Duration,
    /// When the selected strategy finished (prompt Done or blind password
    /// sent); starts the unlock-delay countdown.
    login_done_at: Option<Instant>,
}

impl InputLock {
    pub fn new(engaged: bool, unlock_delay: Duration, quiet_period: Duration) -> Self {
        Self {
            locked: engaged,
            unlock_delay,
            quiet_period,
            login_done_at: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Record the login-complete moment for the delay-based release.
    pub fn mark_login_complete(&mut self, at: Instant) {
        if self.login_done_at.is_none() {
            self.login_done_at = Some(at);
        }
    }

    /// Re-evaluate both release rules. Called on every loop wake.
    ///
    /// `last_rx` is the time of the most recent inbound data; `recent` is
    /// the trailing decoded-text window.
    pub fn tick(&mut self, now: Instant, last_rx: Instant, recent: &str) {
        if !self.locked {
            return;
        }
        if let Some(done) = self.login_done_at {
            if now.saturating_duration_since(done) >= self.unlock_delay {
                info!("input unlocked after login delay");
                self.locked = false;
                return;
            }
        }
        if looks_like_prompt(recent)
            && now.saturating_duration_since(last_rx) >= self.quiet_period
        {
            debug!("input unlocked by prompt heuristic");
            self.locked = false;
        }
    }
}

/// Heuristic: does the recent text end at something prompt-shaped?
///
/// Deliberately loose (a ": " tail in ordinary chat matches too); the
/// quiet-period requirement in [`InputLock::tick`] is the only guard.
fn looks_like_prompt(recent: &str) -> bool {
    const TAILS: [&str; 4] = ["} ", "> ", "# ", ": "];
    TAILS.iter().any(|t| recent.ends_with(t)) || contains_ci(recent, "connected to")
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn contains_any_ci(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials {
            username: "N0CALL".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn prompt_login_answers_each_prompt_once() {
        let mut al = PromptLogin::new(creds());
        let mut recent = RecentText::new();

        // Prompt split across three reads, as the network delivers it
        recent.push("login:");
        assert_eq!(al.check(recent.as_str()), Some("N0CALL"));
        assert_eq!(al.state(), PromptState::AwaitingPasswordPrompt);

        recent.push(" ");
        assert_eq!(al.check(recent.as_str()), None);
        recent.push("\n");
        assert_eq!(al.check(recent.as_str()), None);

        recent.push("Password: ");
        assert_eq!(al.check(recent.as_str()), Some("secret"));
        assert_eq!(al.state(), PromptState::Done);

        // Further prompts are ignored
        recent.push("login: password:");
        assert_eq!(al.check(recent.as_str()), None);
    }

    #[test]
    fn prompt_matching_is_case_insensitive() {
        let mut al = PromptLogin::new(creds());
        assert_eq!(al.check("CALLSIGN:"), Some("N0CALL"));
        assert_eq!(al.check("Enter Password"), Some("secret"));
        assert_eq!(al.state(), PromptState::Done);
    }

    #[test]
    fn blind_login_follows_the_schedule() {
        let t0 = Instant::now();
        let mut al = BlindLogin::new(
            Credentials {
                username: "U".to_string(),
                password: "P".to_string(),
            },
            t0,
        );

        assert_eq!(al.poll(t0), None);
        assert_eq!(al.poll(t0 + Duration::from_millis(149)), None);
        assert_eq!(al.poll(t0 + Duration::from_millis(150)), Some("U"));
        assert_eq!(al.stage(), BlindStage::SentUser);

        // Password waits for its own deadline, measured from connect
        assert_eq!(al.poll(t0 + Duration::from_millis(500)), None);
        let pass_time = t0 + Duration::from_millis(1000);
        assert_eq!(al.poll(pass_time), Some("P"));
        assert_eq!(al.stage(), BlindStage::SentPass);
        assert_eq!(al.pass_sent_at(), Some(pass_time));

        // Exactly one send per stage
        assert_eq!(al.poll(t0 + Duration::from_millis(5000)), None);
    }

    #[test]
    fn recent_text_window_is_bounded() {
        let mut recent = RecentText::new();
        for _ in 0..10 {
            recent.push(&"x".repeat(2000));
        }
        assert_eq!(recent.as_str().chars().count(), RECENT_LIMIT);
        recent.push("login:");
        assert!(recent.as_str().ends_with("login:"));
        assert_eq!(recent.as_str().chars().count(), RECENT_LIMIT);
    }

    #[test]
    fn lock_releases_after_login_delay() {
        let t0 = Instant::now();
        let mut lock = InputLock::new(true, Duration::from_millis(1200), Duration::from_millis(300));
        assert!(lock.is_locked());

        lock.mark_login_complete(t0);
        lock.tick(t0 + Duration::from_millis(1199), t0, "");
        assert!(lock.is_locked());
        lock.tick(t0 + Duration::from_millis(1200), t0, "");
        assert!(!lock.is_locked());
    }

    #[test]
    fn lock_releases_on_quiet_prompt() {
        let t0 = Instant::now();
        let mut lock = InputLock::new(true, Duration::from_millis(1200), Duration::from_millis(300));

        // Prompt tail but the line is still chattering
        lock.tick(t0 + Duration::from_millis(100), t0, "node> ");
        assert!(lock.is_locked());
        // Quiet long enough
        lock.tick(t0 + Duration::from_millis(300), t0, "node> ");
        assert!(!lock.is_locked());
    }

    #[test]
    fn lock_ignores_non_prompt_tails() {
        let t0 = Instant::now();
        let mut lock = InputLock::new(true, Duration::from_millis(1200), Duration::from_millis(300));
        lock.tick(t0 + Duration::from_secs(10), t0, "still printing banner");
        assert!(lock.is_locked());
    }

    #[test]
    fn connected_to_marker_unlocks_after_quiet() {
        let t0 = Instant::now();
        let mut lock = InputLock::new(true, Duration::from_millis(1200), Duration::from_millis(300));
        lock.tick(t0 + Duration::from_millis(400), t0, "*** CONNECTED TO NODE\n");
        assert!(!lock.is_locked());
    }

    #[test]
    fn unlock_heuristic_matches_ordinary_chat_text() {
        // Known limitation, preserved on purpose: a chat line ending in
        // ": " is indistinguishable from a prompt, so a quiet period after
        // "de IZ1ABC: " releases the lock early.
        let t0 = Instant::now();
        let mut lock = InputLock::new(true, Duration::from_millis(1200), Duration::from_millis(300));
        lock.tick(t0 + Duration::from_millis(300), t0, "de IZ1ABC: ");
        assert!(!lock.is_locked());
    }

    #[test]
    fn disengaged_lock_stays_open() {
        let t0 = Instant::now();
        let mut lock = InputLock::new(false, Duration::from_millis(1200), Duration::from_millis(300));
        assert!(!lock.is_locked());
        lock.tick(t0, t0, "");
        assert!(!lock.is_locked());
    }
}
