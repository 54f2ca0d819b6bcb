//! Error rendering using miette
//!
//! This module renders Monkey errors as graphical reports: the diagnostic
//! code, the message, and any help text attached to the error.

use std::io::{self, Write};

use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};

use crate::Error;

/// Render an error with formatting to stderr
///
/// # Example
/// ```no_run
/// use monkey::{Session, render_error};
/// use monkey::ast::builder::*;
///
/// let mut session = Session::default();
/// if let Err(e) = session.eval(&program(vec![expr(infix(int(1), "/", int(0)))])) {
///     render_error(&e);
/// }
/// ```
pub fn render_error(error: &Error) {
    render_error_to_writer(error, &mut io::stderr(), true).ok();
}

/// Render an error to a specific writer
pub fn render_error_to(error: &Error, writer: &mut dyn Write) -> io::Result<()> {
    render_error_to_writer(error, writer, true)
}

/// Render an error to a String (useful for UIs and logs)
pub fn render_error_to_string(error: &Error) -> String {
    render_to_string(error, true)
}

/// Render an error to a String without color codes (useful for tests)
pub fn render_error_to_string_no_color(error: &Error) -> String {
    render_to_string(error, false)
}

fn render_to_string(error: &Error, use_color: bool) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, &mut buf, use_color).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_error_to_writer(
    error: &Error,
    writer: &mut dyn Write,
    use_color: bool,
) -> io::Result<()> {
    let theme = if use_color {
        GraphicalTheme::unicode()
    } else {
        GraphicalTheme::unicode_nocolor()
    };
    let handler = GraphicalReportHandler::new_themed(theme);

    let mut report = String::new();
    handler
        .render_report(&mut report, error as &dyn Diagnostic)
        .map_err(io::Error::other)?;
    writer.write_all(report.as_bytes())
}
