use crate::service::notification_service::OutboundMessage;

const LAYOUT: &str = r#"<!DOCTYPE html>
<html>
  <body style="font-family: Arial, sans-serif; color: #222;">
    <h2>{{subject}}</h2>
    <p>{{body}}</p>
    <p style="color: #888; font-size: 12px;">LabourHub, Hubli-Dharwad</p>
  </body>
</html>"#;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Wraps a plain-text message in the mail layout.
pub fn render_html(message: &OutboundMessage) -> String {
    let placeholders = [
        ("{{subject}}", escape(&message.subject)),
        ("{{body}}", escape(&message.body).replace('\n', "<br>")),
    ];

    placeholders
        .iter()
        .fold(LAYOUT.to_string(), |html, (key, value)| html.replace(key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_layout_and_escapes_markup() {
        let html = render_html(&OutboundMessage::new(
            "Application accepted",
            "Job <Plumbing> & more\nSee you",
        ));

        assert!(html.contains("<h2>Application accepted</h2>"));
        assert!(html.contains("Job &lt;Plumbing&gt; &amp; more<br>See you"));
        assert!(!html.contains("{{"));
    }
}
