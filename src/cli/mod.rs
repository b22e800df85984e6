//! Terminal front end: configuration forms and the reading board.

pub mod board;
pub mod setup;
pub mod show;
pub mod ui;
pub mod watch;
