//! Terminal rendering for the pairing QR challenge.
//!
//! The session service issues the challenge data; this only turns it into a
//! unicode block an operator can scan from the terminal.

use qrcode::render::unicode;
use qrcode::QrCode;

/// Render pairing challenge data as a unicode QR block.
pub fn render_terminal(data: &str) -> Result<String, String> {
    let code = QrCode::new(data.as_bytes()).map_err(|e| e.to_string())?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}
