//! Gmail API client for sending campaign emails.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use dealpig_types::Sender;
use google_gmail1::api::Message;
use google_gmail1::hyper_rustls::HttpsConnector;
use google_gmail1::Gmail;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::io::Cursor;

/// Client bound to one sender account's credentials
pub struct GmailSender {
    hub: Gmail<HttpsConnector<HttpConnector>>,
    pub email_address: String,
}

impl GmailSender {
    /// Create a Gmail client from a sender's stored OAuth refresh token
    pub async fn for_sender(sender: &Sender) -> Result<Self> {
        let refresh_token = sender
            .oauth_refresh_token
            .as_ref()
            .context("Sender has no stored refresh token")?;

        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable must be set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable must be set")?;

        // Build AuthorizedUserSecret with the stored refresh token.
        // Use the yup_oauth2 re-exported by google_gmail1 to avoid version mismatch
        let secret = google_gmail1::yup_oauth2::authorized_user::AuthorizedUserSecret {
            client_id,
            client_secret,
            refresh_token: refresh_token.clone(),
            key_type: "authorized_user".to_string(),
        };

        let auth = google_gmail1::yup_oauth2::AuthorizedUserAuthenticator::builder(secret)
            .build()
            .await
            .context("Failed to build authenticator from refresh token")?;

        let connector = google_gmail1::hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("Failed to load native TLS roots")?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(connector);
        let hub = Gmail::new(client, auth);

        Ok(Self {
            hub,
            email_address: sender.email.clone(),
        })
    }

    /// Fetch the account profile, proving the credentials still work
    pub async fn check_profile(&self) -> Result<String> {
        let (_, profile) = self
            .hub
            .users()
            .get_profile("me")
            .doit()
            .await
            .context("Failed to get profile")?;

        profile.email_address.context("No email address in profile")
    }

    /// Send a raw RFC 2822 message, returning the Gmail message id
    pub async fn send_raw(&self, raw_message: Vec<u8>) -> Result<Option<String>> {
        let mime_type = "message/rfc822"
            .parse::<mime::Mime>()
            .context("Invalid upload mime type")?;

        let (_, sent) = self
            .hub
            .users()
            .messages_send(Message::default(), "me")
            .upload(Cursor::new(raw_message), mime_type)
            .await
            .context("Failed to send message")?;

        Ok(sent.id)
    }
}

/// Build an RFC 2822 MIME message: HTML body plus an optional file
/// attachment in a multipart/mixed envelope.
pub fn build_mime(
    from_name: &str,
    from_address: &str,
    to_address: &str,
    subject: &str,
    html_body: &str,
    attachment: Option<(&str, &[u8])>,
) -> String {
    let mut message = String::new();
    message.push_str(&format!("From: {} <{}>\r\n", from_name, from_address));
    message.push_str(&format!("To: {}\r\n", to_address));
    message.push_str(&format!("Subject: {}\r\n", subject));
    message.push_str("MIME-Version: 1.0\r\n");

    match attachment {
        Some((file_name, bytes)) => {
            let boundary = format!("dealpig_{}", uuid::Uuid::new_v4().simple());
            message.push_str(&format!(
                "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n",
                boundary
            ));

            message.push_str(&format!("--{}\r\n", boundary));
            message.push_str("Content-Type: text/html; charset=utf-8\r\n\r\n");
            message.push_str(html_body);
            message.push_str("\r\n\r\n");

            message.push_str(&format!("--{}\r\n", boundary));
            message.push_str("Content-Type: application/octet-stream\r\n");
            message.push_str("Content-Transfer-Encoding: base64\r\n");
            message.push_str(&format!(
                "Content-Disposition: attachment; filename=\"{}\"\r\n\r\n",
                file_name
            ));

            let encoded = STANDARD.encode(bytes);
            for chunk in encoded.as_bytes().chunks(76) {
                message.push_str(&String::from_utf8_lossy(chunk));
                message.push_str("\r\n");
            }

            message.push_str(&format!("--{}--\r\n", boundary));
        }
        None => {
            message.push_str("Content-Type: text/html; charset=utf-8\r\n\r\n");
            message.push_str(html_body);
            message.push_str("\r\n");
        }
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_message_has_html_content_type() {
        let mime = build_mime(
            "Jess Harper",
            "jess@example.com",
            "owner@example.com",
            "About your property",
            "<p>Hello</p>",
            None,
        );
        assert!(mime.starts_with("From: Jess Harper <jess@example.com>\r\n"));
        assert!(mime.contains("To: owner@example.com\r\n"));
        assert!(mime.contains("Subject: About your property\r\n"));
        assert!(mime.contains("Content-Type: text/html; charset=utf-8"));
        assert!(mime.contains("<p>Hello</p>"));
        assert!(!mime.contains("multipart/mixed"));
    }

    #[test]
    fn attachment_produces_multipart_with_base64() {
        let mime = build_mime(
            "Jess Harper",
            "jess@example.com",
            "owner@example.com",
            "Offer letter",
            "<p>Attached</p>",
            Some(("loi.pdf", b"fake pdf bytes")),
        );
        assert!(mime.contains("multipart/mixed; boundary="));
        assert!(mime.contains("Content-Disposition: attachment; filename=\"loi.pdf\""));
        assert!(mime.contains("Content-Transfer-Encoding: base64"));
        assert!(mime.contains(&STANDARD.encode(b"fake pdf bytes")));
        // Closing boundary present
        assert!(mime.trim_end().ends_with("--"));
    }

    #[test]
    fn base64_lines_wrap_at_76_chars() {
        let payload = vec![0u8; 600];
        let mime = build_mime(
            "A",
            "a@example.com",
            "b@example.com",
            "s",
            "<p>x</p>",
            Some(("blob.bin", &payload)),
        );
        let in_attachment = mime
            .split("Content-Disposition")
            .nth(1)
            .expect("attachment section");
        for line in in_attachment.lines() {
            assert!(line.len() <= 76, "line too long: {}", line.len());
        }
    }
}
