//! UI context for environment detection and configuration.

use std::io::IsTerminal;

use super::OutputMode;

/// Terminal and environment context for UI decisions.
#[derive(Debug, Clone)]
pub struct UiContext {
    /// Whether stdout is a TTY
    pub is_tty: bool,
    /// Whether color output is enabled
    pub color: bool,
    /// Whether unicode symbols are enabled
    pub unicode: bool,
    /// Terminal width (columns)
    pub width: usize,
    /// Resolved output mode
    pub mode: OutputMode,
    /// Only report problems and the summary
    pub quiet: bool,
    /// Prompts may be shown
    pub interactive: bool,
}

/// What the process can observe about its terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Terminal {
    pub stdin_tty: bool,
    pub stdout_tty: bool,
    pub stderr_tty: bool,
    pub dumb: bool,
    pub no_color_env: bool,
    pub width: Option<usize>,
}

impl Terminal {
    pub fn probe() -> Self {
        Self {
            stdin_tty: std::io::stdin().is_terminal(),
            stdout_tty: std::io::stdout().is_terminal(),
            stderr_tty: std::io::stderr().is_terminal(),
            dumb: std::env::var("TERM").map(|v| v == "dumb").unwrap_or(false),
            no_color_env: std::env::var_os("NO_COLOR").is_some(),
            width: terminal_width(),
        }
    }
}

impl UiContext {
    /// Create context from the live terminal and global CLI flags.
    pub fn from_env(
        json_flag: bool,
        quiet_flag: bool,
        no_color_flag: bool,
        ascii_flag: bool,
        no_input_flag: bool,
    ) -> Self {
        Self::for_terminal(
            Terminal::probe(),
            json_flag,
            quiet_flag,
            no_color_flag,
            ascii_flag,
            no_input_flag,
        )
    }

    pub(crate) fn for_terminal(
        term: Terminal,
        json_flag: bool,
        quiet_flag: bool,
        no_color_flag: bool,
        ascii_flag: bool,
        no_input_flag: bool,
    ) -> Self {
        let mode = OutputMode::resolve(json_flag, term.stdout_tty, term.dumb);
        Self {
            is_tty: term.stdout_tty,
            color: term.stdout_tty && !no_color_flag && !term.no_color_env && !term.dumb,
            unicode: !ascii_flag,
            width: term.width.unwrap_or(80),
            mode,
            quiet: quiet_flag,
            // Prompts are written to stderr, so stdout may be piped.
            interactive: !no_input_flag && term.stdin_tty && term.stderr_tty,
        }
    }

    /// Spinners only make sense on a pretty, non-quiet terminal.
    pub fn allows_animation(&self) -> bool {
        self.is_tty && self.mode == OutputMode::Pretty && !self.quiet
    }
}

/// `COLUMNS`, else the width reported by the tty driver.
fn terminal_width() -> Option<usize> {
    if let Ok(cols) = std::env::var("COLUMNS") {
        if let Ok(width) = cols.parse::<usize>() {
            if width > 0 {
                return Some(width);
            }
        }
    }

    #[cfg(unix)]
    {
        use std::mem::MaybeUninit;

        let mut winsize = MaybeUninit::<libc::winsize>::uninit();
        // SAFETY: TIOCGWINSZ only writes into the provided winsize.
        let result =
            unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, winsize.as_mut_ptr()) };
        if result == 0 {
            // SAFETY: ioctl succeeded, so winsize was filled in.
            let ws = unsafe { winsize.assume_init() };
            if ws.ws_col > 0 {
                return Some(ws.ws_col as usize);
            }
        }
    }

    None
}
