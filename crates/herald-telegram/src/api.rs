//! Telegram Bot API transport.
//!
//! `TelegramApi` is the seam the gateway talks to; `BotApi` is the live
//! teloxide implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode, Recipient},
    RequestError,
};

use herald_core::{domain::LinkButton, errors::Error, Result};

/// Where a message goes: one bot, one chat, optionally one forum topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelegramTarget {
    pub bot_token: String,
    /// Numeric chat id (`-100…`) or `@channel` username.
    pub chat_id: String,
    pub thread_id: Option<i32>,
}

impl TelegramTarget {
    fn recipient(&self) -> Recipient {
        match self.chat_id.trim().parse::<i64>() {
            Ok(id) => Recipient::Id(ChatId(id)),
            Err(_) => Recipient::ChannelUsername(self.chat_id.trim().to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Photo {
    Url(String),
    Bytes(Vec<u8>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageExtras {
    pub silent: bool,
    pub buttons: Vec<LinkButton>,
}

#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn send_message(
        &self,
        target: &TelegramTarget,
        html: &str,
        extras: &MessageExtras,
    ) -> Result<()>;

    async fn send_photo(
        &self,
        target: &TelegramTarget,
        photo: Photo,
        caption: Option<&str>,
        extras: &MessageExtras,
    ) -> Result<()>;
}

/// Live transport. One `Bot` per call since every destination carries its own token.
#[derive(Clone)]
pub struct BotApi {
    client: reqwest::Client,
    api_url: Option<Url>,
}

impl BotApi {
    pub fn new(api_url: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        let api_url = api_url
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| Error::Config(format!("TELEGRAM_API_URL is not a valid URL: {e}")))
            })
            .transpose()?;

        Ok(Self { client, api_url })
    }

    fn bot(&self, token: &str) -> Bot {
        let bot = Bot::with_client(token, self.client.clone());
        match &self.api_url {
            Some(url) => bot.set_api_url(url.clone()),
            None => bot,
        }
    }

    fn map_err(e: RequestError) -> Error {
        match e {
            RequestError::Api(api) => Error::Delivery(api.to_string()),
            other => Error::Delivery(format!("telegram request failed: {other}")),
        }
    }
}

fn keyboard(buttons: &[LinkButton]) -> Result<Option<InlineKeyboardMarkup>> {
    if buttons.is_empty() {
        return Ok(None);
    }
    let rows = buttons
        .iter()
        .map(|b| {
            let url = Url::parse(&b.url)
                .map_err(|e| Error::Validation(format!("button URL {} is invalid: {e}", b.url)))?;
            Ok(vec![InlineKeyboardButton::url(b.label.clone(), url)])
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(InlineKeyboardMarkup::new(rows)))
}

#[async_trait]
impl TelegramApi for BotApi {
    async fn send_message(
        &self,
        target: &TelegramTarget,
        html: &str,
        extras: &MessageExtras,
    ) -> Result<()> {
        let markup = keyboard(&extras.buttons)?;
        let mut req = self
            .bot(&target.bot_token)
            .send_message(target.recipient(), html.to_string())
            .parse_mode(ParseMode::Html)
            .disable_notification(extras.silent);
        if let Some(thread_id) = target.thread_id {
            req = req.message_thread_id(thread_id);
        }
        if let Some(markup) = markup {
            req = req.reply_markup(markup);
        }
        req.await.map_err(Self::map_err)?;
        Ok(())
    }

    async fn send_photo(
        &self,
        target: &TelegramTarget,
        photo: Photo,
        caption: Option<&str>,
        extras: &MessageExtras,
    ) -> Result<()> {
        let file = match photo {
            Photo::Url(raw) => InputFile::url(
                Url::parse(&raw)
                    .map_err(|e| Error::Validation(format!("image URL {raw} is invalid: {e}")))?,
            ),
            Photo::Bytes(bytes) => InputFile::memory(bytes).file_name("image.png"),
        };
        let markup = keyboard(&extras.buttons)?;

        let mut req = self
            .bot(&target.bot_token)
            .send_photo(target.recipient(), file)
            .parse_mode(ParseMode::Html)
            .disable_notification(extras.silent);
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            req = req.caption(caption.to_string());
        }
        if let Some(thread_id) = target.thread_id {
            req = req.message_thread_id(thread_id);
        }
        if let Some(markup) = markup {
            req = req.reply_markup(markup);
        }
        req.await.map_err(Self::map_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(chat: &str) -> TelegramTarget {
        TelegramTarget {
            bot_token: "t".to_string(),
            chat_id: chat.to_string(),
            thread_id: None,
        }
    }

    #[test]
    fn numeric_chat_ids_become_id_recipients() {
        assert_eq!(
            target("-1001234").recipient(),
            Recipient::Id(ChatId(-1001234))
        );
        assert_eq!(
            target("@news").recipient(),
            Recipient::ChannelUsername("@news".to_string())
        );
    }

    #[test]
    fn one_url_button_per_row() {
        let markup = keyboard(&[
            LinkButton {
                label: "Site".to_string(),
                url: "https://example.com".to_string(),
            },
            LinkButton {
                label: "Docs".to_string(),
                url: "https://docs.example.com".to_string(),
            },
        ])
        .unwrap()
        .unwrap();
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert!(markup.inline_keyboard.iter().all(|row| row.len() == 1));

        assert!(keyboard(&[]).unwrap().is_none());
        assert!(keyboard(&[LinkButton {
            label: "x".to_string(),
            url: "not a url".to_string(),
        }])
        .is_err());
    }

    #[test]
    fn rejects_malformed_api_url() {
        assert!(BotApi::new(Some("::nope")).is_err());
        assert!(BotApi::new(None).is_ok());
    }
}
