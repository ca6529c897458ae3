//! Form extraction from fetched pages

use crate::client::HttpClient;
use scraper::{Html, Selector};
use surfacemap_core::{Error, Form, Input};
use tracing::{debug, warn};

/// Method recorded when a form has no method attribute
pub const DEFAULT_METHOD: &str = "get";

/// Input type recorded when an input has no type attribute
pub const DEFAULT_INPUT_TYPE: &str = "text";

/// Extract every form in `html`.
///
/// The action is kept exactly as written; normalization is the
/// consolidator's job.
pub fn extract_forms(html: &str) -> Vec<Form> {
    let document = Html::parse_document(html);
    let mut forms = Vec::new();

    let form_selector = Selector::parse("form").unwrap();
    let input_selector = Selector::parse("input").unwrap();

    for form in document.select(&form_selector) {
        let element = form.value();
        let action = element.attr("action").unwrap_or_default().to_string();
        let method = element.attr("method").unwrap_or(DEFAULT_METHOD).to_string();

        let inputs = form
            .select(&input_selector)
            .map(|input| {
                let input = input.value();
                Input::new(
                    input.attr("name").unwrap_or_default(),
                    input.attr("type").unwrap_or(DEFAULT_INPUT_TYPE),
                )
                .with_id(input.attr("id").unwrap_or_default())
                .required(input.attr("required").is_some())
            })
            .collect();

        forms.push(Form::new(action, method, inputs));
    }

    forms
}

/// Fetches pages and extracts their forms
#[derive(Clone)]
pub struct FormExtractor {
    client: HttpClient,
}

impl FormExtractor {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Fetch `url` and return its forms.
    ///
    /// Fetch failures come back as `PageAnalysis`; the caller decides whether
    /// to skip the page.
    pub async fn analyze(&self, url: &str) -> Result<Vec<Form>, Error> {
        let response = self.client.get(url).await.map_err(|e| Error::PageAnalysis {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let forms = extract_forms(&response.body);
        debug!("{} form(s) on {}", forms.len(), url);
        Ok(forms)
    }

    /// Like `analyze`, but logs a warning and yields no forms on failure
    pub async fn analyze_or_skip(&self, url: &str) -> Vec<Form> {
        match self.analyze(url).await {
            Ok(forms) => forms,
            Err(e) => {
                warn!("Error analyzing {}: {}", url, e);
                Vec::new()
            }
        }
    }
}
