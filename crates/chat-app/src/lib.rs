#![deny(unsafe_code)]

/// Terminal chat shell: header, slash commands and streamed reply rendering.
pub mod app;
/// Thread domain: messages, stream lifecycle and the thread list.
pub mod chat;
/// Ctrl-C delivery to the shell.
pub mod interrupt;
pub mod runtime;
/// Settings persistence.
pub mod settings;

#[cfg(test)]
pub(crate) mod test_support;
