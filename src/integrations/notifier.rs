/*!
 * Templated developer notifications.
 *
 * Each recipient gets the message in their own locale. Only the primary
 * language subtag is considered (`pt-BR` uses the `pt` template) and unknown
 * languages fall back to English.
 */

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{DeveloperNotice, Notifier};
use crate::app_config::{MailRelayKind, NotifierConfig};

/// Subject and body of one localized message
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub subject: &'static str,
    pub body: &'static str,
    /// Appended to the body when the notice carries a report link
    pub link_line: &'static str,
}

const EN: Template = Template {
    subject: "Problem with the manifest of {app}",
    body: "We could not update {app} from its manifest: {error}",
    link_line: "The full validation report is available at {link}",
};

const FR: Template = Template {
    subject: "Problème avec le manifeste de {app}",
    body: "Nous n'avons pas pu mettre à jour {app} à partir de son manifeste : {error}",
    link_line: "Le rapport de validation complet est disponible ici : {link}",
};

const ES: Template = Template {
    subject: "Problema con el manifiesto de {app}",
    body: "No pudimos actualizar {app} a partir de su manifiesto: {error}",
    link_line: "El informe de validación completo está disponible en {link}",
};

const DE: Template = Template {
    subject: "Problem mit dem Manifest von {app}",
    body: "{app} konnte nicht anhand seines Manifests aktualisiert werden: {error}",
    link_line: "Der vollständige Validierungsbericht ist unter {link} verfügbar",
};

const PT: Template = Template {
    subject: "Problema com o manifesto de {app}",
    body: "Não foi possível atualizar {app} a partir do seu manifesto: {error}",
    link_line: "O relatório de validação completo está disponível em {link}",
};

/// Template for a developer locale
pub fn template_for(locale: &str) -> &'static Template {
    let language = locale
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    match language.as_str() {
        "fr" => &FR,
        "es" => &ES,
        "de" => &DE,
        "pt" => &PT,
        _ => &EN,
    }
}

/// A rendered message for one recipient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone)]
enum Relay {
    Log,
    Http { client: Client, endpoint: String },
}

/// Notifier rendering localized templates and handing them to a mail relay
#[derive(Debug, Clone)]
pub struct TemplateNotifier {
    relay: Relay,
    from_address: String,
    report_base_url: String,
}

impl TemplateNotifier {
    /// Create a notifier from configuration
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let relay = match config.relay {
            MailRelayKind::Log => Relay::Log,
            MailRelayKind::Http => Relay::Http {
                client: Client::builder()
                    .timeout(Duration::from_secs(config.timeout_secs))
                    .build()
                    .context("Failed to build mail relay HTTP client")?,
                endpoint: config.endpoint.clone(),
            },
        };

        Ok(Self {
            relay,
            from_address: config.from_address.clone(),
            report_base_url: config.validation_report_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Link to a stored validation report
    pub fn report_link(&self, report_id: &str) -> String {
        format!("{}/{}", self.report_base_url, report_id)
    }

    /// Render the message one recipient receives
    pub fn render(&self, notice: &DeveloperNotice, email: &str, locale: &str) -> RenderedMessage {
        let template = template_for(locale);
        let fill = |text: &str| {
            text.replace("{app}", &notice.app_name)
                .replace("{error}", &notice.error_message)
        };

        let mut body = fill(template.body);
        if notice.has_link {
            if let Some(report_id) = notice.report_id.as_deref() {
                body.push_str("\n\n");
                body.push_str(&template.link_line.replace("{link}", &self.report_link(report_id)));
            }
        }

        RenderedMessage {
            from: self.from_address.clone(),
            to: email.to_string(),
            subject: fill(template.subject),
            body,
        }
    }

    async fn send(&self, message: &RenderedMessage) -> Result<()> {
        match &self.relay {
            Relay::Log => {
                info!("Email to {}: {}", message.to, message.subject);
                Ok(())
            }
            Relay::Http { client, endpoint } => {
                let response = client
                    .post(endpoint)
                    .json(message)
                    .send()
                    .await
                    .with_context(|| format!("Failed to reach mail relay at {}", endpoint))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(anyhow!("Mail relay responded with HTTP {}", status.as_u16()));
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Notifier for TemplateNotifier {
    async fn notify(&self, notice: &DeveloperNotice) -> Result<()> {
        if notice.recipients.is_empty() {
            warn!("App {} has no listed developers to notify", notice.app_id);
            return Ok(());
        }

        for recipient in &notice.recipients {
            let message = self.render(notice, &recipient.email, &recipient.locale);
            self.send(&message).await?;
        }

        Ok(())
    }
}
