//! nodechat - an interactive terminal client for packet-radio nodes
//!
//! nodechat connects to a BBS or network node over TCP, keeps the Telnet
//! machinery out of the transcript, and gives line-oriented chat a scrolling,
//! word-wrapped display.
//!
//! # Quick Start
//!
//! ```text
//! nodechat bbs.example.org 6300
//! nodechat bbs.example.org 6300 -u n0call -p secret
//! ```
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter | Send the input line |
//! | PgUp/PgDn | Scroll the transcript by half a page |
//! | Up/Down | Scroll by one line |
//! | Home/End | Jump to the oldest/newest line |
//! | Ctrl+Z | Forward SUB to the node (or suspend, per config) |
//! | F10, Ctrl+C | Quit |

mod autologin;
mod buffer;
mod config;
mod core;
mod ui;

use std::env;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::autologin::{Autologin, BlindLogin, Credentials, PromptLogin};
use crate::config::Config;
use crate::core::net::Connection;
use crate::core::session::{Session, SessionOptions};
use crate::ui::Renderer;

/// Command line arguments. `None` fields fall back to the config file.
#[derive(Default)]
struct CliArgs {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    blind: bool,
    cr_only: bool,
    uppercase: bool,
    no_auto_help: bool,
    no_local_echo: bool,
    no_pass_ctrl_z: bool,
    ctrl_z_cr: bool,
    unlock_delay_ms: Option<u64>,
    unlock_quiet_ms: Option<u64>,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("nodechat {}", VERSION);
}

fn print_help() {
    eprintln!(
        "nodechat {} - interactive terminal client for packet-radio nodes",
        VERSION
    );
    eprintln!();
    eprintln!("Usage: nodechat <host> <port> [OPTIONS]");
    eprintln!();
    eprintln!("Login options:");
    eprintln!("  -u, --user <NAME>     Username (callsign) for autologin");
    eprintln!("  -p, --pass <PASS>     Password for autologin");
    eprintln!("  --blind-auto          Send credentials on a timer instead of");
    eprintln!("                        waiting for login/password prompts");
    eprintln!();
    eprintln!("Line options:");
    eprintln!("  --cr-only             Terminate outbound lines with CR, not CRLF");
    eprintln!("  --upper               Upper-case lines before transmission");
    eprintln!();
    eprintln!("Behavior options:");
    eprintln!("  --no-auto-help        Do not send \"?\" after the first unlock");
    eprintln!("  --no-local-echo       Do not echo sent lines into the transcript");
    eprintln!("  --no-pass-ctrl-z      Ctrl+Z suspends instead of sending SUB");
    eprintln!("  --ctrl-z-cr           Append the line terminator after SUB");
    eprintln!("  --unlock-delay <MS>   Minimum input lock after login (default 1200)");
    eprintln!("  --unlock-quiet <MS>   RX quiet period for early unlock (default 300)");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  nodechat node.example.org 6300");
    eprintln!("  nodechat node.example.org 6300 -u n0call -p secret --upper");
    eprintln!();
    eprintln!("Configuration: ~/.nodechat/config.toml");
    eprintln!("Log file:      ~/.nodechat/nodechat.log");
}

fn parse_args() -> Result<CliArgs, String> {
    let args: Vec<String> = env::args().collect();
    let mut cli = CliArgs::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-u" | "--user" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing username argument".to_string());
                }
                cli.username = Some(args[i].clone());
            }
            "-p" | "--pass" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing password argument".to_string());
                }
                cli.password = Some(args[i].clone());
            }
            "--blind-auto" => {
                cli.blind = true;
            }
            "--cr-only" => {
                cli.cr_only = true;
            }
            "--upper" => {
                cli.uppercase = true;
            }
            "--no-auto-help" => {
                cli.no_auto_help = true;
            }
            "--no-local-echo" => {
                cli.no_local_echo = true;
            }
            "--no-pass-ctrl-z" => {
                cli.no_pass_ctrl_z = true;
            }
            "--ctrl-z-cr" => {
                cli.ctrl_z_cr = true;
            }
            "--unlock-delay" => {
                i += 1;
                let ms = args
                    .get(i)
                    .and_then(|a| a.parse().ok())
                    .ok_or("--unlock-delay requires a millisecond value")?;
                cli.unlock_delay_ms = Some(ms);
            }
            "--unlock-quiet" => {
                i += 1;
                let ms = args
                    .get(i)
                    .and_then(|a| a.parse().ok())
                    .ok_or("--unlock-quiet requires a millisecond value")?;
                cli.unlock_quiet_ms = Some(ms);
            }
            arg if cli.host.is_none() && !arg.starts_with('-') => {
                cli.host = Some(arg.to_string());
            }
            arg if cli.port.is_none() && !arg.starts_with('-') => {
                cli.port = Some(arg.parse().map_err(|_| format!("Invalid port: {}", arg))?);
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    if cli.host.is_none() || cli.port.is_none() {
        return Err("Usage: nodechat <host> <port> [OPTIONS]".to_string());
    }

    Ok(cli)
}

/// Validate the merged credential settings. Either autologin strategy
/// needs both halves; `--blind-auto` with neither is a mistake, not a
/// request for no autologin.
fn resolve_credentials(
    username: Option<String>,
    password: Option<String>,
    blind: bool,
) -> Result<Option<Credentials>, String> {
    match (username, password) {
        (Some(username), Some(password)) => Ok(Some(Credentials { username, password })),
        (None, None) if blind => Err("--blind-auto requires both -u and -p".to_string()),
        (None, None) => Ok(None),
        _ => Err("-u and -p must be given together".to_string()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = match parse_args() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    // Initialize logging to file (stdout belongs to the display)
    let log_path = config::log_dir()
        .map(|d| d.join("nodechat.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("nodechat.log"));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    info!("nodechat starting...");

    run_client(cli)
}

fn run_client(cli: CliArgs) -> anyhow::Result<()> {
    let file_config = Config::load();

    // Merge: command line overrides config file
    let username = cli.username.or(file_config.login.username);
    let password = cli.password.or(file_config.login.password);
    let blind = cli.blind || file_config.login.blind;

    let creds = match resolve_credentials(username, password, blind) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let opts = SessionOptions {
        cr_only: cli.cr_only || file_config.line_ending.eq_ignore_ascii_case("cr"),
        uppercase: cli.uppercase || file_config.uppercase,
        local_echo: !cli.no_local_echo && file_config.local_echo,
        auto_help: !cli.no_auto_help && file_config.auto_help,
        ctrl_z_eol: cli.ctrl_z_cr || file_config.ctrl_z_eol,
        unlock_delay: Duration::from_millis(
            cli.unlock_delay_ms.unwrap_or(file_config.unlock_delay_ms),
        ),
        quiet_period: Duration::from_millis(
            cli.unlock_quiet_ms.unwrap_or(file_config.unlock_quiet_ms),
        ),
    };
    let pass_ctrl_z = !cli.no_pass_ctrl_z && file_config.pass_ctrl_z;

    let host = cli.host.unwrap_or_default();
    let port = cli.port.unwrap_or_default();

    // Connect before touching the display so failures print normally
    info!("connecting to {}:{}", host, port);
    let conn = match Connection::connect(&host, port) {
        Ok(c) => c,
        Err(e) => {
            error!("connect failed: {}", e);
            eprintln!("nodechat: cannot connect to {}:{}: {}", host, port, e);
            std::process::exit(1);
        }
    };

    // The blind timer starts at connection time
    let autologin = match creds {
        Some(creds) if blind => Autologin::Blind(BlindLogin::new(creds, Instant::now())),
        Some(creds) => Autologin::Prompt(PromptLogin::new(creds)),
        None => Autologin::None,
    };

    let (cols, rows) = terminal::size()?;
    let mut session = Session::new(conn, opts, autologin, cols, rows);

    let mut renderer = Renderer::new(&format!("{}:{}", host, port));
    renderer.init()?;

    // Run main loop with guaranteed display teardown
    let result = run_main_loop(&mut session, &mut renderer, pass_ctrl_z);

    let _ = renderer.cleanup();
    let _ = terminal::disable_raw_mode();

    match result {
        Ok(()) => {
            info!("nodechat exiting");
            Ok(())
        }
        Err(e) => {
            error!("session ended: {}", e);
            eprintln!("nodechat: {}", e);
            Err(e)
        }
    }
}

/// Main event loop. Returns `Ok(())` on a requested quit and `Err` when the
/// connection drops or the display fails.
fn run_main_loop(
    session: &mut Session,
    renderer: &mut Renderer,
    pass_ctrl_z: bool,
) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(10);
    let mut needs_render = true;
    let mut was_locked = session.is_locked();

    loop {
        // Service the socket, then the timers
        if session.process_inbound()? {
            needs_render = true;
        }
        session.tick()?;

        // The lock state lives in the status bar
        if session.is_locked() != was_locked {
            was_locked = session.is_locked();
            needs_render = true;
        }

        if needs_render {
            renderer.render(session)?;
            needs_render = false;
        }

        if !event::poll(poll_timeout)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    _ if is_ctrl_key(&key, 'c') => {
                        info!("quit requested (Ctrl+C)");
                        return Ok(());
                    }
                    _ if is_ctrl_key(&key, 'z') => {
                        if pass_ctrl_z {
                            session.send_substitute()?;
                        } else {
                            suspend(session, renderer)?;
                        }
                        needs_render = true;
                    }
                    KeyCode::F(10) => {
                        info!("quit requested (F10)");
                        return Ok(());
                    }
                    KeyCode::Enter => {
                        session.submit()?;
                        needs_render = true;
                    }
                    KeyCode::Backspace | KeyCode::Delete => {
                        session.input_backspace();
                        needs_render = true;
                    }
                    KeyCode::PageUp => {
                        session.buffer.page_up();
                        needs_render = true;
                    }
                    KeyCode::PageDown => {
                        session.buffer.page_down();
                        needs_render = true;
                    }
                    KeyCode::Up => {
                        session.buffer.line_up();
                        needs_render = true;
                    }
                    KeyCode::Down => {
                        session.buffer.line_down();
                        needs_render = true;
                    }
                    KeyCode::Home => {
                        session.buffer.scroll_home();
                        needs_render = true;
                    }
                    KeyCode::End => {
                        session.buffer.scroll_end();
                        needs_render = true;
                    }
                    KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                        session.input_char(ch);
                        needs_render = true;
                    }
                    _ => {}
                }
            }
            Event::Resize(cols, rows) => {
                session.resize(cols, rows);
                needs_render = true;
            }
            _ => {}
        }
    }
}

/// Control-chord check, ignoring case so Shift does not mask the chord.
fn is_ctrl_key(key: &event::KeyEvent, target: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char(ch) if ch.eq_ignore_ascii_case(&target))
}

/// Suspend to the controlling shell: tear the display down, stop the
/// process, and rebuild it when resumed.
#[cfg(unix)]
fn suspend(session: &mut Session, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("suspending (Ctrl+Z)");
    renderer.cleanup()?;

    // SAFETY: raising SIGTSTP on ourselves has no preconditions
    unsafe {
        libc::raise(libc::SIGTSTP);
    }

    // Execution resumes here after SIGCONT
    renderer.init()?;
    let (cols, rows) = terminal::size()?;
    session.resize(cols, rows);
    info!("resumed");
    Ok(())
}

/// Without job control there is nothing to hand the terminal back to, so
/// Ctrl+Z is ignored when SUB pass-through is disabled.
#[cfg(not(unix))]
fn suspend(_session: &mut Session, _renderer: &mut Renderer) -> anyhow::Result<()> {
    Ok(())
}
