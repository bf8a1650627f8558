//! Open and click tracking instrumentation.
//!
//! Opens are detected with a hidden 1x1 image whose URL identifies the
//! campaign and recipient. Clicks are detected by pointing every `http(s)`
//! link at a redirect endpoint that carries the original target as a query
//! parameter. Neither changes the text a reader sees.

use std::sync::LazyLock;

use herald_common::{CampaignId, SendOptions};
use regex::{Captures, Regex};

/// Path of the open-tracking pixel endpoint.
pub const OPEN_PATH: &str = "/track/open";

/// Path of the click-tracking redirect endpoint.
pub const CLICK_PATH: &str = "/track/click";

/// Query parameter carrying the campaign id.
pub const CAMPAIGN_PARAM: &str = "cid";

/// Query parameter carrying the recipient's email.
pub const EMAIL_PARAM: &str = "email";

/// Query parameter carrying the original link target.
pub const URL_PARAM: &str = "url";

/// A quoted `href` attribute inside a tag. Group 1 runs from the tag's `<`
/// to the opening quote.
static HREF: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used, reason = "The pattern is a compile-time constant")]
    Regex::new(r#"(?i)(<[a-z][^<>]*?\shref\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Embeds tracking references into a personalised body.
#[derive(Debug, Clone)]
pub struct TrackingInjector {
    base_url: String,
}

impl TrackingInjector {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Where callers can poll the campaign's status.
    #[must_use]
    pub fn campaign_url(&self, campaign_id: &CampaignId) -> String {
        format!("{}/api/campaigns/{campaign_id}", self.base_url)
    }

    #[must_use]
    pub fn open_url(&self, campaign_id: &CampaignId, email: &str) -> String {
        format!(
            "{}{OPEN_PATH}?{CAMPAIGN_PARAM}={campaign_id}&{EMAIL_PARAM}={}",
            self.base_url,
            urlencoding::encode(email)
        )
    }

    #[must_use]
    pub fn click_url(&self, campaign_id: &CampaignId, email: &str, target: &str) -> String {
        format!(
            "{}{CLICK_PATH}?{CAMPAIGN_PARAM}={campaign_id}&{EMAIL_PARAM}={}&{URL_PARAM}={}",
            self.base_url,
            urlencoding::encode(email),
            urlencoding::encode(target)
        )
    }

    /// Apply whichever instrumentation `options` enables to `body`.
    #[must_use]
    pub fn inject(
        &self,
        body: &str,
        campaign_id: &CampaignId,
        email: &str,
        options: &SendOptions,
    ) -> String {
        let body = if options.track_clicks {
            self.rewrite_links(body, campaign_id, email)
        } else {
            body.to_string()
        };

        if options.track_opens {
            self.append_open_pixel(&body, campaign_id, email)
        } else {
            body
        }
    }

    /// Point every `http(s)` link at the click redirect.
    #[must_use]
    pub fn rewrite_links(&self, body: &str, campaign_id: &CampaignId, email: &str) -> String {
        HREF.replace_all(body, |caps: &Captures<'_>| {
            let (target, quote) = match (caps.get(2), caps.get(3)) {
                (Some(target), _) => (target.as_str(), '"'),
                (None, Some(target)) => (target.as_str(), '\''),
                (None, None) => return caps[0].to_string(),
            };

            if !self.is_trackable(target) {
                return caps[0].to_string();
            }

            let target = target.trim().replace("&amp;", "&");
            format!(
                "{}{quote}{}{quote}",
                &caps[1],
                self.click_url(campaign_id, email, &target)
            )
        })
        .into_owned()
    }

    /// Insert the open pixel before the closing `</body>`, or at the end.
    #[must_use]
    pub fn append_open_pixel(&self, body: &str, campaign_id: &CampaignId, email: &str) -> String {
        let pixel = format!(
            r#"<img src="{}" width="1" height="1" alt="" style="display:none;border:0;width:1px;height:1px" />"#,
            self.open_url(campaign_id, email)
        );

        // ASCII lowercasing keeps byte offsets aligned with `body`
        match body.to_ascii_lowercase().rfind("</body>") {
            Some(index) => {
                let mut out = String::with_capacity(body.len() + pixel.len());
                out.push_str(&body[..index]);
                out.push_str(&pixel);
                out.push_str(&body[index..]);
                out
            }
            None => format!("{body}{pixel}"),
        }
    }

    fn is_trackable(&self, target: &str) -> bool {
        let target = target.trim();
        let lower = target.to_ascii_lowercase();
        (lower.starts_with("http://") || lower.starts_with("https://"))
            && !target.starts_with(&format!("{}{CLICK_PATH}", self.base_url))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn injector() -> TrackingInjector {
        TrackingInjector::new("https://t.example.com/")
    }

    fn options(track_opens: bool, track_clicks: bool) -> SendOptions {
        SendOptions {
            delay_ms: 1000,
            batch_size: 50,
            track_opens,
            track_clicks,
        }
    }

    fn query_param(url: &str, name: &str) -> Option<String> {
        let (_, query) = url.split_once('?')?;
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| urlencoding::decode(value).unwrap().into_owned())
        })
    }

    fn hrefs(body: &str) -> Vec<String> {
        HREF.captures_iter(body)
            .filter_map(|caps| caps.get(2).or_else(|| caps.get(3)))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_click_rewriting_keeps_original_recoverable() {
        let id = CampaignId::generate();
        let body = r#"<a href="http://example.com">Visit</a>"#;

        let out = injector().inject(body, &id, "a+b@x.com", &options(false, true));
        let links = hrefs(&out);
        assert_eq!(links.len(), 1);
        assert!(links[0].starts_with("https://t.example.com/track/click?"));
        assert_eq!(
            query_param(&links[0], URL_PARAM).as_deref(),
            Some("http://example.com")
        );
        assert_eq!(
            query_param(&links[0], EMAIL_PARAM).as_deref(),
            Some("a+b@x.com")
        );
        assert_eq!(
            query_param(&links[0], CAMPAIGN_PARAM),
            Some(id.to_string())
        );
        assert!(out.contains(">Visit</a>"));
    }

    #[test]
    fn test_click_rewriting_disabled() {
        let id = CampaignId::generate();
        let body = r#"<a href="http://example.com">Visit</a>"#;
        assert_eq!(
            injector().inject(body, &id, "a@x.com", &options(false, false)),
            body
        );
    }

    #[test]
    fn test_only_http_links_are_rewritten() {
        let id = CampaignId::generate();
        let tracked = injector().click_url(&id, "a@x.com", "https://example.com");
        let body = format!(
            r##"<a href="mailto:help@x.com">Mail</a>
<a href='tel:+123'>Call</a>
<a href="#top">Top</a>
<a href="{tracked}">Already</a>
<a HREF='HTTPS://Example.com/a?x=1&amp;y=2'>Shout</a>"##
        );

        let links = hrefs(&injector().rewrite_links(&body, &id, "a@x.com"));
        assert_eq!(links[0], "mailto:help@x.com");
        assert_eq!(links[1], "tel:+123");
        assert_eq!(links[2], "#top");
        assert_eq!(links[3], tracked);
        assert_eq!(
            query_param(&links[4], URL_PARAM).as_deref(),
            Some("HTTPS://Example.com/a?x=1&y=2")
        );
    }

    #[test]
    fn test_only_href_attributes_in_tags_are_rewritten() {
        let id = CampaignId::generate();
        let body = r#"<p>Set href="http://example.com/text" in your template</p>
<a data-href="http://example.com/data" class="btn">Data</a>
<a class="btn"
   href="http://example.com/real">Real</a>"#;

        let out = injector().rewrite_links(body, &id, "a@x.com");
        assert!(out.contains(r#"href="http://example.com/text" in your"#));
        assert!(out.contains(r#"data-href="http://example.com/data""#));
        assert!(!out.contains(r#"href="http://example.com/real""#));

        let tracked = injector().click_url(&id, "a@x.com", "http://example.com/real");
        assert!(out.contains(&format!("href=\"{tracked}\"")));
    }

    #[test]
    fn test_open_pixel_placement() {
        let id = CampaignId::generate();
        let body = "<html><body><p>Hi</p></BODY></html>";
        let out = injector().append_open_pixel(body, &id, "a@x.com");

        assert!(out.starts_with("<html><body><p>Hi</p><img src=\"https://t.example.com/track/open?cid="));
        assert!(out.ends_with("/></BODY></html>"));
        assert!(out.contains("width=\"1\" height=\"1\""));

        let out = injector().append_open_pixel("<p>Hi</p>", &id, "a@x.com");
        assert!(out.starts_with("<p>Hi</p><img "));
    }

    #[test]
    fn test_inject_both() {
        let id = CampaignId::generate();
        let body = r#"<a href="https://shop.example.com">Shop now</a>"#;
        let out = injector().inject(body, &id, "a@x.com", &options(true, true));

        assert!(out.contains("/track/click?"));
        assert!(out.contains("/track/open?"));
        // The pixel's own src must not be treated as a link
        assert_eq!(hrefs(&out).len(), 1);
    }

    #[test]
    fn test_campaign_url() {
        let id = CampaignId::generate();
        assert_eq!(
            injector().campaign_url(&id),
            format!("https://t.example.com/api/campaigns/{id}")
        );
    }
}
