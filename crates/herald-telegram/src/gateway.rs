//! `DestinationGateway` over the Telegram Bot API.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::time::sleep;
use tracing::debug;

use herald_core::{
    domain::{Destination, ImageRef, ProviderKind, SendOptions},
    errors::Error,
    formatting::{
        clip_html_text, extract_headline, fit_html_to_limit, sanitize_telegram_html, strip_tags,
    },
    gateway::DestinationGateway,
    splitter::char_len,
    Result,
};

use crate::api::{MessageExtras, Photo, TelegramApi, TelegramTarget};

const CAPTION_PLACEHOLDER: &str = "📝";
const CONNECTION_TEST_TEXT: &str = "✅ Herald connection test";

#[derive(Clone, Debug)]
pub struct TelegramSettings {
    /// Safety margin under Telegram's 1024.
    pub caption_limit: usize,
    /// Safety margin under Telegram's 4096.
    pub text_limit: usize,
    pub chunk_delay: Duration,
    pub caption_followup_delay: Duration,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            caption_limit: 1000,
            text_limit: 4000,
            chunk_delay: Duration::from_millis(300),
            caption_followup_delay: Duration::from_millis(500),
        }
    }
}

pub struct TelegramGateway<A> {
    api: Arc<A>,
    settings: TelegramSettings,
}

impl<A: TelegramApi> TelegramGateway<A> {
    pub fn new(api: Arc<A>, settings: TelegramSettings) -> Self {
        Self { api, settings }
    }

    fn target_for(destination: &Destination) -> Result<TelegramTarget> {
        let creds = destination.credentials.telegram().ok_or_else(|| {
            Error::Config(format!(
                "destination {} has no Telegram credentials",
                destination.id
            ))
        })?;
        if !creds.is_complete() {
            return Err(Error::Config(format!(
                "destination {} is missing a bot token or channel id",
                destination.id
            )));
        }
        Ok(TelegramTarget {
            bot_token: creds.bot_token.trim().to_string(),
            chat_id: creds.channel_id.trim().to_string(),
            thread_id: creds.message_thread_id,
        })
    }

    /// Text-only sends, chunked without breaking markup; extras ride on the last chunk.
    async fn send_text(
        &self,
        target: &TelegramTarget,
        text: &str,
        extras: MessageExtras,
    ) -> Result<()> {
        let chunks = fit_html_to_limit(text, self.settings.text_limit);
        let last = chunks.len().saturating_sub(1);
        for (idx, chunk) in chunks.iter().enumerate() {
            if idx > 0 && !self.settings.chunk_delay.is_zero() {
                sleep(self.settings.chunk_delay).await;
            }
            if idx == last {
                self.api.send_message(target, chunk, &extras).await?;
            } else {
                self.api
                    .send_message(target, chunk, &MessageExtras::default())
                    .await?;
            }
        }
        Ok(())
    }
}

/// Short caption for an image whose text will follow separately.
fn short_caption(text: &str, limit: usize) -> String {
    if let Some(headline) = extract_headline(text) {
        // Room for the <b></b> wrapper.
        let inner = clip_html_text(&headline, limit.saturating_sub(7).max(1));
        return format!("<b>{inner}</b>");
    }
    let first_line = text
        .lines()
        .map(|l| strip_tags(l).trim().to_string())
        .find(|l| !l.is_empty());
    match first_line {
        Some(line) => clip_html_text(&line, limit),
        None => CAPTION_PLACEHOLDER.to_string(),
    }
}

fn photo_from(image: &ImageRef) -> Result<Photo> {
    match image {
        ImageRef::Url(url) => Ok(Photo::Url(url.clone())),
        ImageRef::Inline(data) => {
            let payload = match data.split_once(",") {
                Some((prefix, rest)) if prefix.starts_with("data:") => rest,
                _ => data.as_str(),
            };
            STANDARD
                .decode(payload.trim())
                .map(Photo::Bytes)
                .map_err(|e| Error::Validation(format!("inline image is not valid base64: {e}")))
        }
    }
}

fn extras_from(opts: &SendOptions) -> MessageExtras {
    MessageExtras {
        silent: opts.silent,
        buttons: opts.buttons.clone(),
    }
}

#[async_trait]
impl<A: TelegramApi + 'static> DestinationGateway for TelegramGateway<A> {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Telegram
    }

    fn sanitize(&self, text: &str) -> String {
        sanitize_telegram_html(text)
    }

    async fn send_chunk(
        &self,
        destination: &Destination,
        text: &str,
        image: Option<&ImageRef>,
        opts: &SendOptions,
    ) -> Result<()> {
        let target = Self::target_for(destination)?;
        let extras = extras_from(opts);

        let Some(image) = image else {
            return self.send_text(&target, text, extras).await;
        };
        let photo = photo_from(image)?;

        if char_len(text) <= self.settings.caption_limit {
            return self
                .api
                .send_photo(&target, photo, Some(text), &extras)
                .await;
        }

        debug!(
            destination = %destination.id,
            len = char_len(text),
            "text exceeds caption limit; sending it after the image"
        );
        let caption = short_caption(text, self.settings.caption_limit);
        self.api
            .send_photo(&target, photo, Some(&caption), &MessageExtras::default())
            .await?;
        if !self.settings.caption_followup_delay.is_zero() {
            sleep(self.settings.caption_followup_delay).await;
        }
        self.send_text(&target, text, extras).await
    }

    async fn test_connection(&self, destination: &Destination) -> Result<()> {
        let target = Self::target_for(destination)?;
        self.api
            .send_message(&target, CONNECTION_TEST_TEXT, &MessageExtras::default())
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use herald_core::domain::{LinkButton, TelegramCredentials};
    use std::sync::Mutex;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub(crate) enum Call {
        Message {
            chat_id: String,
            text: String,
            extras: MessageExtras,
        },
        Photo {
            photo: Photo,
            caption: Option<String>,
            extras: MessageExtras,
        },
    }

    #[derive(Default)]
    pub(crate) struct FakeApi {
        calls: Mutex<Vec<Call>>,
        fail_with: Mutex<Option<String>>,
    }

    impl FakeApi {
        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn fail_with(&self, description: &str) {
            *self.fail_with.lock().unwrap() = Some(description.to_string());
        }

        fn outcome(&self) -> Result<()> {
            match self.fail_with.lock().unwrap().clone() {
                Some(d) => Err(Error::Delivery(d)),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl TelegramApi for FakeApi {
        async fn send_message(
            &self,
            target: &TelegramTarget,
            html: &str,
            extras: &MessageExtras,
        ) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Message {
                chat_id: target.chat_id.clone(),
                text: html.to_string(),
                extras: extras.clone(),
            });
            self.outcome()
        }

        async fn send_photo(
            &self,
            _target: &TelegramTarget,
            photo: Photo,
            caption: Option<&str>,
            extras: &MessageExtras,
        ) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Photo {
                photo,
                caption: caption.map(str::to_string),
                extras: extras.clone(),
            });
            self.outcome()
        }
    }

    fn gateway(api: Arc<FakeApi>) -> TelegramGateway<FakeApi> {
        TelegramGateway::new(
            api,
            TelegramSettings {
                chunk_delay: Duration::ZERO,
                caption_followup_delay: Duration::ZERO,
                ..Default::default()
            },
        )
    }

    fn destination() -> Destination {
        Destination::telegram(
            "tg",
            "News",
            TelegramCredentials {
                bot_token: "123:abc".to_string(),
                channel_id: "@news".to_string(),
                message_thread_id: Some(7),
            },
        )
    }

    fn image() -> ImageRef {
        ImageRef::Url("https://cdn.example.com/a.png".to_string())
    }

    fn with_buttons() -> SendOptions {
        SendOptions {
            silent: true,
            buttons: vec![LinkButton {
                label: "Read".to_string(),
                url: "https://example.com".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn caption_that_fits_is_one_photo() {
        let api = Arc::new(FakeApi::default());
        let gw = gateway(api.clone());

        gw.send_chunk(&destination(), "short", Some(&image()), &with_buttons())
            .await
            .unwrap();

        assert_eq!(
            api.calls(),
            vec![Call::Photo {
                photo: Photo::Url("https://cdn.example.com/a.png".to_string()),
                caption: Some("short".to_string()),
                extras: extras_from(&with_buttons()),
            }]
        );
    }

    #[tokio::test]
    async fn caption_overflow_sends_photo_then_full_text() {
        let api = Arc::new(FakeApi::default());
        let gw = gateway(api.clone());
        let text = format!("<b>Big news</b>\n{}", "x".repeat(1200));

        gw.send_chunk(&destination(), &text, Some(&image()), &with_buttons())
            .await
            .unwrap();

        let calls = api.calls();
        assert_eq!(calls.len(), 2);
        match &calls[0] {
            Call::Photo {
                caption, extras, ..
            } => {
                assert_eq!(caption.as_deref(), Some("<b>Big news</b>"));
                assert_eq!(extras, &MessageExtras::default());
            }
            other => panic!("expected photo, got {other:?}"),
        }
        match &calls[1] {
            Call::Message {
                chat_id,
                text: sent,
                extras,
            } => {
                assert_eq!(chat_id, "@news");
                assert_eq!(sent, &text);
                assert!(extras.silent);
                assert_eq!(extras.buttons.len(), 1);
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn long_text_is_chunked_with_extras_on_last_chunk() {
        let api = Arc::new(FakeApi::default());
        let gw = gateway(api.clone());
        let text = format!("{}\n{}", "a".repeat(3000), "b".repeat(3000));

        gw.send_chunk(&destination(), &text, None, &with_buttons())
            .await
            .unwrap();

        let calls = api.calls();
        assert_eq!(calls.len(), 2);
        let extras: Vec<_> = calls
            .iter()
            .map(|c| match c {
                Call::Message { extras, text, .. } => {
                    assert!(char_len(text) <= 4000);
                    extras.clone()
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(extras[0], MessageExtras::default());
        assert!(extras[1].silent);
    }

    #[tokio::test]
    async fn chunked_markup_stays_balanced() {
        let api = Arc::new(FakeApi::default());
        let gw = gateway(api.clone());
        let text = format!("<pre>{}\n{}</pre>", "a".repeat(3500), "b &amp; c ".repeat(300));

        gw.send_chunk(&destination(), &text, None, &SendOptions::default())
            .await
            .unwrap();

        let calls = api.calls();
        assert_eq!(calls.len(), 2);
        for call in calls {
            let Call::Message { text, .. } = call else {
                panic!("expected message");
            };
            assert!(char_len(&text) <= 4000);
            assert!(text.starts_with("<pre>") && text.ends_with("</pre>"), "{text}");
            assert_eq!(text.matches('&').count(), text.matches("&amp;").count());
        }
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_call() {
        let api = Arc::new(FakeApi::default());
        let gw = gateway(api.clone());
        let mut dest = destination();
        dest.credentials = herald_core::domain::DestinationCredentials::Telegram(
            TelegramCredentials {
                bot_token: String::new(),
                channel_id: "@news".to_string(),
                message_thread_id: None,
            },
        );

        let err = gw
            .send_chunk(&dest, "hi", None, &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn api_error_text_surfaces_verbatim() {
        let api = Arc::new(FakeApi::default());
        api.fail_with("Forbidden: bot is not a member of the channel chat");
        let gw = gateway(api.clone());

        let err = gw
            .send_chunk(&destination(), "hi", None, &SendOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Forbidden: bot is not a member of the channel chat"
        );
    }

    #[tokio::test]
    async fn inline_image_is_decoded_from_data_url() {
        let api = Arc::new(FakeApi::default());
        let gw = gateway(api.clone());
        let img = ImageRef::Inline("data:image/png;base64,aGVsbG8=".to_string());

        gw.send_chunk(&destination(), "cap", Some(&img), &SendOptions::default())
            .await
            .unwrap();

        match &api.calls()[0] {
            Call::Photo { photo, .. } => assert_eq!(photo, &Photo::Bytes(b"hello".to_vec())),
            other => panic!("expected photo, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_test_sends_diagnostic_message() {
        let api = Arc::new(FakeApi::default());
        let gw = gateway(api.clone());

        gw.test_connection(&destination()).await.unwrap();
        match &api.calls()[0] {
            Call::Message { text, .. } => assert_eq!(text, CONNECTION_TEST_TEXT),
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn short_caption_falls_back_to_first_line_then_placeholder() {
        assert_eq!(short_caption("<i>Intro</i>\nrest", 1000), "Intro");
        assert_eq!(short_caption("\n  \n", 1000), CAPTION_PLACEHOLDER);
        let clipped = short_caption(&"y".repeat(50), 10);
        assert_eq!(char_len(&clipped), 10);
        assert!(clipped.ends_with('…'));
    }
}
