//! Turns campaign copy into the bodies handed to the email provider.
//!
//! Rendering is a pure function of [`CampaignContent`]: no I/O, no clock.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::campaign::CampaignContent;

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub html: String,
    pub text: String,
}

pub fn render(content: &CampaignContent) -> RenderedMessage {
    RenderedMessage {
        html: render_html(content),
        text: strip_markup(content.body.as_ref()),
    }
}

/// Plain-text fallback for clients that cannot display HTML.
pub fn strip_markup(content: &str) -> String {
    MARKUP_TAG.replace_all(content, "").into_owned()
}

/// Blank-line separated blocks become paragraphs, single newlines become line breaks.
pub fn format_paragraphs(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");

    normalized
        .split("\n\n")
        .map(|paragraph| {
            let lines: Vec<&str> = paragraph.split('\n').map(str::trim).collect();

            format!(
                r#"<p style="margin-bottom: 1em; line-height: 1.6; color: #555555;">{}</p>"#,
                lines.join("<br>")
            )
        })
        .collect()
}

fn render_image(content: &CampaignContent) -> String {
    match &content.image_url {
        Some(image_url) => format!(
            r#"<img src="{}" alt="Newsletter Image" width="100%" style="margin-bottom: 20px; border-radius: 6px;" />"#,
            image_url.as_ref()
        ),
        None => String::new(),
    }
}

fn render_html(content: &CampaignContent) -> String {
    format!(
        r##"<table width="100%" cellpadding="0" cellspacing="0" style="background-color:#f4f4f4; padding: 30px 0;">
  <tr>
    <td align="center">
      <table width="600" cellpadding="0" cellspacing="0" style="background-color: #ffffff; padding: 40px; font-family: Arial, sans-serif; border-radius: 8px;">
        <tr>
          <td align="center">{image}</td>
        </tr>
        <tr>
          <td>
            <h2 style="color: #333333;">{title}</h2>
            {paragraphs}
            <a href="{cta_url}" style="display:inline-block; padding: 12px 24px; background-color: #007bff; color: #fff; text-decoration: none; border-radius: 4px; margin-top: 20px;">{cta_text}</a>
            <hr style="margin: 30px 0;" />
            <p style="font-size: 14px; color: #999999;">If you'd prefer not to receive emails like this, you can <a href="#" style="color: #999;">unsubscribe</a> at any time.</p>
          </td>
        </tr>
      </table>
    </td>
  </tr>
</table>"##,
        image = render_image(content),
        title = content.title.as_ref(),
        paragraphs = format_paragraphs(content.body.as_ref()),
        cta_url = content.cta_url.as_ref(),
        cta_text = content.cta_text.as_ref(),
    )
}
