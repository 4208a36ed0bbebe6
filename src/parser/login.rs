use std::sync::LazyLock;

use reqwest::Method;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{Result, ScrapeError};

pub const FORM_NAME: &str = "Form1";
pub const PHONE_FIELD: &str = "Login1:txtMSISDN";
pub const PASSWORD_FIELD: &str = "Login1:txtPassword";

static FORM_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());
static CONTROL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input, select, textarea").unwrap());
static OPTION_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());
static PASSWORD_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"input[name="Login1:txtPassword"]"#).unwrap());

const TEXT_INPUTS: &[&str] = &["", "text", "hidden", "password", "email", "tel", "number"];

/// A form ready to submit: resolved action, method, and fields in document order.
#[derive(Debug, Clone)]
pub struct LoginForm {
    /// Page the form was found on, sent as `Referer`.
    pub page_url: Url,
    pub action: Url,
    pub method: Method,
    pub fields: Vec<(String, String)>,
}

impl LoginForm {
    /// Replace the value of `name`, or append it if the form has no such field.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }

    /// Replace the value of an existing field.
    pub fn fill(&mut self, name: &str, value: &str) -> Result<()> {
        let (_, v) = self
            .fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| ScrapeError::LoginFieldMissing(name.to_string()))?;
        *v = value.to_string();
        Ok(())
    }

    /// True while the page still offers the password box, i.e. we are not logged in.
    pub fn is_login_page(doc: &Html) -> bool {
        doc.select(&PASSWORD_SEL).next().is_some()
    }
}

/// Locate the `Form1` login form and collect its successful controls.
pub fn find_login_form(doc: &Html, page_url: &Url) -> Result<LoginForm> {
    let form = doc
        .select(&FORM_SEL)
        .find(|f| {
            let el = f.value();
            el.attr("name") == Some(FORM_NAME) || el.id() == Some(FORM_NAME)
        })
        .ok_or(ScrapeError::LoginFormMissing)?;

    let action = match form.value().attr("action").map(str::trim) {
        Some(a) if !a.is_empty() => page_url.join(a)?,
        _ => page_url.clone(),
    };
    let method = match form.value().attr("method") {
        Some(m) if m.trim().eq_ignore_ascii_case("post") => Method::POST,
        _ => Method::GET,
    };

    Ok(LoginForm {
        page_url: page_url.clone(),
        action,
        method,
        fields: collect_fields(&form),
    })
}

fn collect_fields(form: &ElementRef) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let mut submit_taken = false;

    for control in form.select(&CONTROL_SEL) {
        let el = control.value();
        let Some(name) = el.attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };
        if el.attr("disabled").is_some() {
            continue;
        }

        let value = match el.name() {
            "input" => {
                let kind = el.attr("type").unwrap_or("").trim().to_ascii_lowercase();
                match kind.as_str() {
                    k if TEXT_INPUTS.contains(&k) => el.attr("value").unwrap_or("").to_string(),
                    "checkbox" | "radio" if el.attr("checked").is_some() => {
                        el.attr("value").unwrap_or("on").to_string()
                    }
                    "submit" if !submit_taken => {
                        submit_taken = true;
                        el.attr("value").unwrap_or("").to_string()
                    }
                    _ => continue,
                }
            }
            "select" => {
                let options: Vec<ElementRef> = control.select(&OPTION_SEL).collect();
                let chosen = options
                    .iter()
                    .find(|o| o.value().attr("selected").is_some())
                    .or(options.first());
                match chosen {
                    Some(o) => o
                        .value()
                        .attr("value")
                        .map(str::to_string)
                        .unwrap_or_else(|| super::collapse_ws(&o.text().collect::<String>())),
                    None => continue,
                }
            }
            "textarea" => control.text().collect(),
            _ => continue,
        };

        fields.push((name.to_string(), value));
    }

    fields
}
