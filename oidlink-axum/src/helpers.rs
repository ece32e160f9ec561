use crate::{OidlinkAxumError, OidlinkState};
use axum::extract::{Form, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use oidlink_flow::{CallbackOutcome, CallbackParams, LoginPage, VerificationNotice, VERIFY_EMAIL_NOTICE};
use oidlink_session::SessionContext;
use serde::Deserialize;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};

/// Cookie carrying the one-shot notice shown on the next page.
pub const NOTICE_COOKIE: &str = "oidlink_notice";

/// Path of the verification email resend endpoint.
pub const VERIFY_EMAIL_PATH: &str = "/verify-email";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    /// Where to go after a successful login.
    pub destination: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailForm {
    #[serde(rename = "idToken")]
    pub id_token: String,
}

/// A message for the user, carried across one redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    LoginFailed,
    VerificationSent,
    SessionExpired,
    VerificationFailed,
}

impl Notice {
    pub fn key(&self) -> &'static str {
        match self {
            Notice::LoginFailed => "login_failed",
            Notice::VerificationSent => "verification_sent",
            Notice::SessionExpired => "session_expired",
            Notice::VerificationFailed => "verification_failed",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        [
            Notice::LoginFailed,
            Notice::VerificationSent,
            Notice::SessionExpired,
            Notice::VerificationFailed,
        ]
        .into_iter()
        .find(|notice| notice.key() == key)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Notice::LoginFailed => oidlink_flow::LOGIN_FAILED_NOTICE,
            Notice::VerificationSent => VerificationNotice::Sent.message(),
            Notice::SessionExpired => VerificationNotice::SessionExpired.message(),
            Notice::VerificationFailed => VerificationNotice::Failed.message(),
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Notice::VerificationSent)
    }
}

impl From<VerificationNotice> for Notice {
    fn from(notice: VerificationNotice) -> Self {
        match notice {
            VerificationNotice::Sent => Notice::VerificationSent,
            VerificationNotice::SessionExpired => Notice::SessionExpired,
            VerificationNotice::Failed => Notice::VerificationFailed,
        }
    }
}

/// Read and clear the pending notice.
pub fn take_notice(cookies: &Cookies) -> Option<Notice> {
    let cookie = cookies.get(NOTICE_COOKIE)?;
    cookies.remove(Cookie::build(NOTICE_COOKIE).path("/").into());
    Notice::from_key(cookie.value())
}

fn set_notice(cookies: &Cookies, notice: Notice) {
    cookies.add(
        Cookie::build((NOTICE_COOKIE, notice.key()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .into(),
    );
}

impl OidlinkState {
    /// The session named by the request cookie, or a fresh one.
    pub fn session(&self, cookies: &Cookies) -> SessionContext {
        let id = cookies
            .get(&self.session_config.cookie_name)
            .map(|c| c.value().to_string());
        SessionContext::new(self.session_store.clone(), id)
    }

    fn persist_session(&self, cookies: &Cookies, session: &SessionContext) {
        let Some(id) = session.id() else {
            return;
        };
        let current = cookies.get(&self.session_config.cookie_name);
        if current.as_ref().map(|c| c.value()) == Some(id) {
            return;
        }
        cookies.add(
            Cookie::build((self.session_config.cookie_name.clone(), id.to_string()))
                .path("/")
                .http_only(true)
                .secure(self.session_config.secure)
                .same_site(SameSite::Lax)
                .into(),
        );
    }

    fn clear_session(&self, cookies: &Cookies) {
        cookies.remove(
            Cookie::build(self.session_config.cookie_name.clone())
                .path("/")
                .into(),
        );
    }
}

pub async fn axum_login_handler(State(state): State<OidlinkState>, cookies: Cookies) -> Response {
    let mut session = state.session(&cookies);
    let page = state.controller.start_login(&mut session).await;
    state.persist_session(&cookies, &session);

    match page {
        Ok(LoginPage::Redirect(url)) => Redirect::to(&url).into_response(),
        Ok(LoginPage::Render(widget)) => Json(widget).into_response(),
        Err(e) => OidlinkAxumError::from(e).into_response(),
    }
}

pub async fn axum_callback_handler(
    State(state): State<OidlinkState>,
    cookies: Cookies,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let mut session = state.session(&cookies);
    let params = CallbackParams {
        code: query.code,
        state: query.state,
        error: query.error,
        error_description: query.error_description,
    };

    let outcome = state
        .controller
        .handle_callback(&params, &mut session, query.destination.as_deref())
        .await;
    state.persist_session(&cookies, &session);

    match outcome {
        CallbackOutcome::VerifyEmail { id_token } => verify_email_page(&id_token).into_response(),
        CallbackOutcome::Failed { .. } => {
            set_notice(&cookies, Notice::LoginFailed);
            Redirect::to(outcome.location()).into_response()
        }
        CallbackOutcome::LoggedIn { .. } | CallbackOutcome::Restart { .. } => {
            Redirect::to(outcome.location()).into_response()
        }
    }
}

pub async fn axum_logout_handler(State(state): State<OidlinkState>, cookies: Cookies) -> Response {
    let mut session = state.session(&cookies);
    let logout_url = state.controller.handle_logout(&mut session).await;
    state.clear_session(&cookies);

    match logout_url {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => OidlinkAxumError::from(e).into_response(),
    }
}

pub async fn axum_verify_email_handler(
    State(state): State<OidlinkState>,
    cookies: Cookies,
    Form(form): Form<VerifyEmailForm>,
) -> Response {
    let notice = state
        .controller
        .resend_verification_email(&form.id_token)
        .await;
    set_notice(&cookies, notice.into());
    Redirect::to(oidlink_flow::controller::SITE_ROOT).into_response()
}

fn verify_email_page(id_token: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html><body>\n<p>{notice}</p>\n\
         <form method=\"post\" action=\"{action}\">\
         <input type=\"hidden\" name=\"idToken\" value=\"{token}\"/>\
         <button type=\"submit\">Resend verification email</button>\
         </form>\n</body></html>\n",
        notice = VERIFY_EMAIL_NOTICE,
        action = VERIFY_EMAIL_PATH,
        token = escape_attribute(id_token),
    ))
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
