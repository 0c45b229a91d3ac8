pub mod safemap;
pub use safemap::SafeMap;

/// Shared formatting for the action macros below.
/// The first argument is the "thing" that performed the action (bold blue),
/// the second is the action name (green), any remaining arguments are dimmed context.
#[doc(hidden)]
#[macro_export]
macro_rules! __action_log {
    ($level:ident, $thing:expr, $action:expr) => {
        tracing::$level!("\x1b[1;34m{}\x1b[0m → \x1b[32m{}\x1b[0m", $thing, $action)
    };
    ($level:ident, $thing:expr, $action:expr, $($arg:tt)+) => {
        tracing::$level!("\x1b[1;34m{}\x1b[0m → \x1b[32m{}\x1b[0m \x1b[2m{}\x1b[0m", $thing, $action, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! action_info {
    ($($arg:tt)+) => { $crate::__action_log!(info, $($arg)+) };
}

#[macro_export]
macro_rules! action_debug {
    ($($arg:tt)+) => { $crate::__action_log!(debug, $($arg)+) };
}

#[macro_export]
macro_rules! action_warn {
    ($($arg:tt)+) => { $crate::__action_log!(warn, $($arg)+) };
}

#[macro_export]
macro_rules! action_error {
    ($($arg:tt)+) => { $crate::__action_log!(error, $($arg)+) };
}
