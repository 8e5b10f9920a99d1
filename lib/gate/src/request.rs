//! Host-neutral request and response views.
//!
//! The gate never touches a framework's request type. The host buffers the
//! request into a [`GateRequest`] and turns the [`GateResponse`] back into
//! whatever it serves.

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderValue, InvalidHeaderValue};
use http::{Method, StatusCode, Uri};
use openid_gate_core::SessionId;

/// A buffered inbound request bound to its session.
#[derive(Debug, Clone)]
pub struct GateRequest {
    session: SessionId,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl GateRequest {
    /// Creates a request view.
    #[must_use]
    pub fn new(session: SessionId, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            session,
            method,
            uri,
            headers,
            body,
        }
    }

    /// Creates a bodiless GET request, mostly for tests and probes.
    #[must_use]
    pub fn get(session: SessionId, uri: Uri) -> Self {
        Self::new(session, Method::GET, uri, HeaderMap::new(), Bytes::new())
    }

    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the first value of a query parameter, percent-decoded.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Returns the value of a request cookie.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Splits the request back into the parts a host rebuilds from.
    #[must_use]
    pub fn into_parts(self) -> (Method, Uri, HeaderMap, Bytes) {
        (self.method, self.uri, self.headers, self.body)
    }

    /// Replaces method, target, headers and body. The session stays.
    pub(crate) fn replace(&mut self, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) {
        self.method = method;
        self.uri = uri;
        self.headers = headers;
        self.body = body;
    }

    /// Rewrites the request into a bodiless GET for `uri`.
    pub(crate) fn forward_to(&mut self, uri: Uri) {
        self.headers.remove(header::CONTENT_TYPE);
        self.headers.remove(header::CONTENT_LENGTH);
        self.method = Method::GET;
        self.uri = uri;
        self.body = Bytes::new();
    }
}

/// The response the gate (or the verifier) writes when it handles a request.
#[derive(Debug, Clone)]
pub struct GateResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
    committed: bool,
}

impl Default for GateResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl GateResponse {
    /// Creates an empty, uncommitted `200 OK` response.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: String::new(),
            committed: false,
        }
    }

    /// Commits a `302 Found` redirect.
    ///
    /// # Errors
    ///
    /// Returns an error if `location` is not a valid header value. The
    /// response is left unchanged in that case.
    pub fn send_redirect(&mut self, location: &str) -> Result<(), InvalidHeaderValue> {
        let value = HeaderValue::from_str(location)?;
        self.status = StatusCode::FOUND;
        self.headers.insert(header::LOCATION, value);
        self.body.clear();
        self.committed = true;
        Ok(())
    }

    /// Commits an error status with a plain-text message.
    ///
    /// Replaces anything written before, including a redirect.
    pub fn send_error(&mut self, status: StatusCode, message: &str) {
        self.status = status;
        self.headers.remove(header::LOCATION);
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.body = message.to_string();
        self.committed = true;
    }

    /// Appends a header, typically `Set-Cookie`.
    pub fn append_header(&mut self, name: header::HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the redirect target, if one was sent.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    /// Returns true once a redirect or error has been written.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Converts into an `http::Response`.
    #[must_use]
    pub fn into_http(self) -> http::Response<String> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> GateRequest {
        GateRequest::get(SessionId::new(), uri.parse().expect("valid uri"))
    }

    #[test]
    fn query_param_is_decoded() {
        let req = request("/callback?code=a%2Fb&state=xyz&code=second");
        assert_eq!(req.query_param("code").as_deref(), Some("a/b"));
        assert_eq!(req.query_param("state").as_deref(), Some("xyz"));
        assert_eq!(req.query_param("missing"), None);
        assert_eq!(request("/plain").query_param("code"), None);
    }

    #[test]
    fn cookie_lookup_splits_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; gate_session=sess_1; other=x"),
        );
        let req = GateRequest::new(
            SessionId::new(),
            Method::GET,
            Uri::from_static("/"),
            headers,
            Bytes::new(),
        );
        assert_eq!(req.cookie("gate_session"), Some("sess_1"));
        assert_eq!(req.cookie("theme"), Some("dark"));
        assert_eq!(req.cookie("absent"), None);
    }

    #[test]
    fn forward_to_drops_body_and_switches_to_get() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let mut req = GateRequest::new(
            SessionId::new(),
            Method::POST,
            Uri::from_static("/submit"),
            headers,
            Bytes::from_static(b"payload"),
        );
        let session = req.session();
        req.forward_to(Uri::from_static("/home"));

        assert_eq!(*req.method(), Method::GET);
        assert_eq!(req.uri(), "/home");
        assert!(req.body().is_empty());
        assert!(req.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(req.session(), session);
    }

    #[test]
    fn redirect_commits_response() {
        let mut response = GateResponse::new();
        assert!(!response.is_committed());
        response
            .send_redirect("https://idp.example/auth?x=1")
            .expect("valid location");
        assert!(response.is_committed());
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.location(), Some("https://idp.example/auth?x=1"));
    }

    #[test]
    fn invalid_redirect_leaves_response_untouched() {
        let mut response = GateResponse::new();
        assert!(response.send_redirect("bad\nvalue").is_err());
        assert!(!response.is_committed());
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn error_replaces_redirect() {
        let mut response = GateResponse::new();
        response
            .send_redirect("https://idp.example/auth")
            .expect("valid location");
        response.send_error(StatusCode::UNAUTHORIZED, "Authentication failed");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.location(), None);

        let http = response.into_http();
        assert_eq!(http.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(http.body(), "Authentication failed");
    }
}
