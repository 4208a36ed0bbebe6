use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, REFERER, REFRESH};
use reqwest::{redirect, Client, Method, Proxy, Response};
use scraper::Html;
use tracing::{debug, info};
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::parser::login::LoginForm;
use crate::parser::refresh::{meta_refresh, parse_refresh_content};
use crate::settings::Settings;

const MAX_REDIRECTS: usize = 10;
const MAX_REFRESHES: usize = 5;

/// A fetched page after redirects and refreshes.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub content_type: Option<String>,
    pub body: String,
}

impl Page {
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => ct.to_ascii_lowercase().contains("html"),
            None => self.body.trim_start().starts_with('<'),
        }
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }

    /// Fail with a descriptive error unless this page is HTML.
    pub fn expect_html(self, what: &'static str) -> Result<Self> {
        if self.is_html() {
            Ok(self)
        } else {
            Err(ScrapeError::NotHtml { page: what })
        }
    }
}

/// One browser-like session: a single cookie jar shared by every request.
pub struct Session {
    client: Client,
    max_refresh_delay: Duration,
}

impl Session {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .user_agent(settings.user_agent())
            .timeout(settings.timeout())
            .redirect(redirect::Policy::limited(MAX_REDIRECTS));

        builder = match settings.proxy.as_deref().map(str::trim) {
            Some("") => builder.no_proxy(),
            Some(proxy) => builder.proxy(Proxy::all(proxy)?),
            None => builder,
        };

        Ok(Self {
            client: builder.build()?,
            max_refresh_delay: settings.max_refresh_delay(),
        })
    }

    pub async fn get(&self, url: &Url) -> Result<Page> {
        debug!(%url, "GET");
        let resp = self.client.get(url.clone()).send().await?;
        self.finish(resp).await
    }

    /// Submit a form the way a browser would: urlencoded body for POST, query string for GET.
    pub async fn submit(&self, form: &LoginForm) -> Result<Page> {
        debug!(url = %form.action, method = %form.method, fields = form.fields.len(), "submit form");
        let req = if form.method == Method::POST {
            self.client.post(form.action.clone()).form(&form.fields)
        } else {
            let mut url = form.action.clone();
            url.query_pairs_mut().extend_pairs(&form.fields);
            self.client.get(url)
        };
        let resp = req.header(REFERER, form.page_url.as_str()).send().await?;
        self.finish(resp).await
    }

    /// Follow `Refresh` headers and meta refreshes up to `MAX_REFRESHES` hops.
    async fn finish(&self, resp: Response) -> Result<Page> {
        let mut header = refresh_header(&resp);
        let mut page = read_page(resp).await?;

        for _ in 0..MAX_REFRESHES {
            let from_header = header
                .as_deref()
                .and_then(|v| parse_refresh_content(v, &page.url));
            let (source, refresh) = match from_header {
                Some(r) => ("header", Some(r)),
                None if page.is_html() => ("meta", meta_refresh(&page.document(), &page.url)),
                None => ("meta", None),
            };
            let Some((delay, target)) = refresh else {
                break;
            };
            if delay > self.max_refresh_delay {
                debug!(url = %target, delay_secs = delay.as_secs(), "refresh delay too long, staying");
                break;
            }
            info!(from = %page.url, to = %target, delay_secs = delay.as_secs(), source, "following refresh");
            tokio::time::sleep(delay).await;
            let resp = self.client.get(target).send().await?;
            header = refresh_header(&resp);
            page = read_page(resp).await?;
        }

        Ok(page)
    }
}

fn refresh_header(resp: &Response) -> Option<String> {
    resp.headers()
        .get(REFRESH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn read_page(resp: Response) -> Result<Page> {
    let status = resp.status();
    let url = resp.url().clone();
    if !status.is_success() {
        return Err(ScrapeError::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            url: url.to_string(),
        });
    }

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp.text().await?;
    debug!(%url, status = status.as_u16(), bytes = body.len(), "response");

    Ok(Page {
        url,
        content_type,
        body,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{header, HeaderMap, Uri};
    use axum::response::{Html as HtmlBody, IntoResponse, Response as AxumResponse};
    use axum::routing::get;
    use axum::Router;

    use super::*;

    type Hits = Arc<Mutex<Vec<String>>>;

    fn page(content_type: Option<&str>, body: &str) -> Page {
        Page {
            url: Url::parse("https://ebill.t-mobile.com/myTMobile/onPrintBill.do").unwrap(),
            content_type: content_type.map(str::to_string),
            body: body.to_string(),
        }
    }

    #[test]
    fn html_detection() {
        assert!(page(Some("text/html; charset=ISO-8859-1"), "").is_html());
        assert!(page(Some("application/xhtml+xml"), "").is_html());
        assert!(!page(Some("application/json"), "<not really>").is_html());
        assert!(page(None, "  \n<!DOCTYPE html><html></html>").is_html());
        assert!(!page(None, "%PDF-1.4").is_html());
    }

    #[test]
    fn expect_html_names_the_page() {
        let err = page(Some("application/pdf"), "%PDF")
            .expect_html("printable bill")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to retrieve HTML for printable bill, has my.t-mobile.com changed?"
        );
    }

    fn refresh_to(content: &str) -> String {
        format!(r#"<html><head><meta http-equiv="refresh" content="{content}"></head><body>wait</body></html>"#)
    }

    async fn start(State(hits): State<Hits>, uri: Uri) -> AxumResponse {
        hits.lock().unwrap().push(uri.to_string());
        (
            [(header::REFRESH, "0; url=/next")],
            HtmlBody("<html><body>wait</body></html>"),
        )
            .into_response()
    }

    async fn next(State(hits): State<Hits>, uri: Uri) -> HtmlBody<&'static str> {
        hits.lock().unwrap().push(uri.to_string());
        HtmlBody("<html><body>arrived</body></html>")
    }

    async fn slow(State(hits): State<Hits>, uri: Uri) -> HtmlBody<String> {
        hits.lock().unwrap().push(uri.to_string());
        HtmlBody(refresh_to("30; url=/next"))
    }

    async fn again(State(hits): State<Hits>, uri: Uri) -> HtmlBody<String> {
        hits.lock().unwrap().push(uri.to_string());
        HtmlBody(refresh_to("0; url=/again"))
    }

    /// Echo the `Referer` header back as the page body.
    async fn echo(State(hits): State<Hits>, uri: Uri, headers: HeaderMap) -> HtmlBody<String> {
        hits.lock().unwrap().push(uri.to_string());
        let referer = headers
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");
        HtmlBody(format!("<html><body>{referer}</body></html>"))
    }

    async fn fake_site() -> (Session, Url, Hits) {
        let hits: Hits = Arc::default();
        let app = Router::new()
            .route("/start", get(start))
            .route("/next", get(next))
            .route("/slow", get(slow))
            .route("/again", get(again))
            .route("/echo", get(echo).post(echo))
            .with_state(hits.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                phone_number = "2065550100"
                password = "hunter2"
                owner = "tests@example.com"
                proxy = ""
                timeout_secs = 5
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        (Session::new(&settings).unwrap(), base, hits)
    }

    fn form(base: &Url, method: Method, action: &str) -> LoginForm {
        LoginForm {
            page_url: base.join("/login/MyTmobileLogin.aspx").unwrap(),
            action: base.join(action).unwrap(),
            method,
            fields: vec![
                ("q".to_string(), "bill date".to_string()),
                ("page".to_string(), "2".to_string()),
            ],
        }
    }

    #[tokio::test]
    async fn follows_refresh_header() {
        let (session, base, hits) = fake_site().await;
        let page = session.get(&base.join("/start").unwrap()).await.unwrap();
        assert_eq!(page.url.path(), "/next");
        assert!(page.body.contains("arrived"));
        assert_eq!(*hits.lock().unwrap(), vec!["/start", "/next"]);
    }

    #[tokio::test]
    async fn long_refresh_stays_on_page() {
        let (session, base, hits) = fake_site().await;
        let page = session.get(&base.join("/slow").unwrap()).await.unwrap();
        assert_eq!(page.url.path(), "/slow");
        assert_eq!(*hits.lock().unwrap(), vec!["/slow"]);
    }

    #[tokio::test]
    async fn refresh_loop_stops_after_five_hops() {
        let (session, base, hits) = fake_site().await;
        let page = session.get(&base.join("/again").unwrap()).await.unwrap();
        assert_eq!(page.url.path(), "/again");
        assert_eq!(hits.lock().unwrap().len(), 1 + MAX_REFRESHES);
    }

    #[tokio::test]
    async fn get_form_puts_fields_in_query() {
        let (session, base, hits) = fake_site().await;
        let page = session
            .submit(&form(&base, Method::GET, "/echo?lang=en"))
            .await
            .unwrap();
        assert_eq!(page.url.query(), Some("lang=en&q=bill+date&page=2"));
        assert_eq!(*hits.lock().unwrap(), vec!["/echo?lang=en&q=bill+date&page=2"]);
    }

    #[tokio::test]
    async fn submit_sends_form_page_as_referer() {
        let (session, base, _) = fake_site().await;
        let login = base.join("/login/MyTmobileLogin.aspx").unwrap();
        for method in [Method::POST, Method::GET] {
            let page = session.submit(&form(&base, method, "/echo")).await.unwrap();
            assert!(page.body.contains(login.as_str()), "{}", page.body);
        }
    }
}
