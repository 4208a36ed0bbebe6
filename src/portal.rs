use tracing::info;
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::parser::cycles::{parse_bill_cycles, BillCycle, BillCycles, CycleLink};
use crate::parser::login::{find_login_form, LoginForm, PASSWORD_FIELD, PHONE_FIELD};
use crate::parser::summary::{parse_usage_summary, UsageLine};
use crate::session::{Page, Session};
use crate::settings::Settings;

const LOGIN_PATH: &str = "/login/MyTmobileLogin.aspx";
const MONTHLY_USAGE_PATH: &str = "/PartnerServices.aspx?service=eBill&link=MonthlyUsage";
const UNBILLED_USAGES_PATH: &str = "/myTMobile/getUnbilledUsages.do";
const USAGE_OVERVIEW_PATH: &str = "/myTMobile/pages/modunbilledusage/unbilledUsageOverview.jsp";
const BILL_SELECTION_PATH: &str =
    "/PartnerServices.aspx?service=eBill&link=DetailsUsage&unavid=viewbill";
const EBILL_APP_PATH: &str = "/myTMobile/";
const PRINT_BILL_PATH: &str = "/myTMobile/onPrintBill.do";

/// Normally injected by the login page's postback script.
const EVENT_TARGET: (&str, &str) = ("__EVENTTARGET", "Login1$btnLogin");
const EVENT_ARGUMENT: (&str, &str) = ("__EVENTARGUMENT", "");

/// An authenticated session on my.t-mobile.com and its eBill host.
pub struct Portal {
    session: Session,
    portal_base: Url,
    ebill_base: Url,
    phone_number: String,
}

impl Portal {
    /// Open the login page, fill in credentials and submit.
    pub async fn login(settings: &Settings) -> Result<Self> {
        let portal = Self {
            session: Session::new(settings)?,
            portal_base: Url::parse(&settings.endpoints.portal)?,
            ebill_base: Url::parse(&settings.endpoints.ebill)?,
            phone_number: settings.phone_number.clone(),
        };

        let page = portal
            .session
            .get(&portal.portal_base.join(LOGIN_PATH)?)
            .await?
            .expect_html("login page")?;

        let mut form = find_login_form(&page.document(), &page.url)?;
        form.set(EVENT_TARGET.0, EVENT_TARGET.1);
        form.set(EVENT_ARGUMENT.0, EVENT_ARGUMENT.1);
        form.fill(PHONE_FIELD, &settings.phone_number)?;
        form.fill(PASSWORD_FIELD, &settings.password)?;

        info!(phone = %mask(&settings.phone_number), "logging in");
        let landing = portal.session.submit(&form).await?;
        if landing.is_html() && LoginForm::is_login_page(&landing.document()) {
            return Err(ScrapeError::LoginRejected);
        }
        info!(url = %landing.url, "logged in");

        Ok(portal)
    }

    /// Unbilled usage for the current cycle.
    pub async fn usage_summary(&self) -> Result<Vec<UsageLine>> {
        // The overview page only renders after eBill has been entered and primed for this number.
        self.session
            .get(&self.portal_base.join(MONTHLY_USAGE_PATH)?)
            .await?;

        let mut unbilled = self.ebill_base.join(UNBILLED_USAGES_PATH)?;
        unbilled
            .query_pairs_mut()
            .append_pair("FromJSONCall", "true")
            .append_pair("msisdn0", &self.phone_number);
        self.session.get(&unbilled).await?;

        let page = self
            .session
            .get(&self.ebill_base.join(USAGE_OVERVIEW_PATH)?)
            .await?
            .expect_html("usage summary page")?;

        let lines = parse_usage_summary(&page.document())?;
        info!(services = lines.len(), "usage summary parsed");
        Ok(lines)
    }

    /// Bill cycles offered on the bill selection page.
    pub async fn bill_cycles(&self) -> Result<BillCycles> {
        let page = self
            .session
            .get(&self.portal_base.join(BILL_SELECTION_PATH)?)
            .await?
            .expect_html("bill selection page")?;

        let cycles = parse_bill_cycles(&page.document())?;
        info!(cycles = cycles.len(), "bill cycles found");
        Ok(cycles)
    }

    /// Switch the session to `cycle` if needed and fetch its printable bill.
    pub async fn printable_bill(&self, cycle: &BillCycle) -> Result<Page> {
        if let CycleLink::Href(href) = &cycle.link {
            let url = self.ebill_base.join(EBILL_APP_PATH)?.join(href)?;
            info!(cycle = %cycle.label, %url, "selecting bill cycle");
            self.session.get(&url).await?;
        }

        self.session
            .get(&self.ebill_base.join(PRINT_BILL_PATH)?)
            .await?
            .expect_html("printable bill")
    }
}

fn mask(phone: &str) -> String {
    let visible = phone.len().saturating_sub(4);
    phone
        .chars()
        .enumerate()
        .map(|(i, c)| if i < visible { '*' } else { c })
        .collect()
}
