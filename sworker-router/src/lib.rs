//! Request classification for the interception layer.
//!
//! Every intercepted request is mapped to exactly one [`Route`]: either it
//! passes straight through to the network untouched, or it is handled by
//! one of the partition strategies named by [`StrategyKind`].
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. web-font CSS host: pass through
//! 2. font file extension or font CDN host: `Font`
//! 3. path contains the API segment: `Api`
//! 4. image file extension: `Image`
//! 5. HTML accept header, extension-less path, `/` or `.html`: `Page`
//! 6. foreign origin: pass through
//! 7. essential static asset: `StaticShell`, anything else: `Default`
//!
//! Only GET requests are classified; any other method passes through.
//!
//! # Examples
//!
//! ```
//! use sworker_cache::HttpRequest;
//! use sworker_router::{RequestClassifier, Route, StrategyKind};
//! use url::Url;
//!
//! let classifier = RequestClassifier::builder(Url::parse("https://garage.test").unwrap())
//!     .build()
//!     .unwrap();
//!
//! let request = HttpRequest::parse_get("https://garage.test/api/cars").unwrap();
//! assert_eq!(classifier.classify(&request), Route::Intercept(StrategyKind::Api));
//! ```
#![warn(clippy::unwrap_used)]
pub use regex::Regex;
use std::fmt;
use sworker_cache::HttpRequest;
use tracing::trace;
pub use url;
use url::{Origin, Url};

const FONT_EXTENSIONS: &str = r"(?i)\.(woff2?|ttf|otf|eot)$";
const IMAGE_EXTENSIONS: &str = r"(?i)\.(png|jpe?g|gif|webp|svg|ico|avif|bmp)$";

/// Handling policy selected for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    StaticShell,
    Api,
    Image,
    Font,
    Page,
    Default,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::StaticShell => "static",
            StrategyKind::Api => "api",
            StrategyKind::Image => "image",
            StrategyKind::Font => "font",
            StrategyKind::Page => "page",
            StrategyKind::Default => "default",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted: the host performs the plain network fetch
    Passthrough,
    Intercept(StrategyKind),
}

// A single classification rule; `None` means "not mine, ask the next one".
trait ClassificationRule: Send + Sync {
    fn classify(&self, request: &HttpRequest) -> Option<Route>;
}

struct HostRule {
    hosts: Vec<String>,
    route: Route,
}

impl ClassificationRule for HostRule {
    fn classify(&self, request: &HttpRequest) -> Option<Route> {
        let host = request.url.host_str()?;
        self.hosts
            .iter()
            .any(|h| h.eq_ignore_ascii_case(host))
            .then_some(self.route)
    }
}

struct PathRegexRule {
    pattern: Regex,
    route: Route,
}

impl ClassificationRule for PathRegexRule {
    fn classify(&self, request: &HttpRequest) -> Option<Route> {
        self.pattern
            .is_match(request.url.path())
            .then_some(self.route)
    }
}

struct PathSegmentRule {
    segment: String,
    route: Route,
}

impl ClassificationRule for PathSegmentRule {
    fn classify(&self, request: &HttpRequest) -> Option<Route> {
        request
            .url
            .path()
            .contains(&self.segment)
            .then_some(self.route)
    }
}

struct DocumentRule;

impl ClassificationRule for DocumentRule {
    fn classify(&self, request: &HttpRequest) -> Option<Route> {
        let accepts_html = request
            .header("accept")
            .is_some_and(|accept| accept.contains("text/html"));
        let path = request.url.path();
        let is_document = path.ends_with('/')
            || path.to_ascii_lowercase().ends_with(".html")
            || !has_extension(path);

        (accepts_html || is_document)
            .then_some(Route::Intercept(StrategyKind::Page))
    }
}

struct ForeignOriginRule {
    origin: Origin,
}

impl ClassificationRule for ForeignOriginRule {
    fn classify(&self, request: &HttpRequest) -> Option<Route> {
        (request.url.origin() != self.origin).then_some(Route::Passthrough)
    }
}

struct StaticAssetRule {
    paths: Vec<String>,
}

impl ClassificationRule for StaticAssetRule {
    fn classify(&self, request: &HttpRequest) -> Option<Route> {
        let path = request.url.path();
        self.paths
            .iter()
            .any(|p| p == path)
            .then_some(Route::Intercept(StrategyKind::StaticShell))
    }
}

fn has_extension(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|segment| segment.contains('.'))
}

/// Builder for [`RequestClassifier`]; every setting has a default.
#[derive(Debug, Clone)]
pub struct ClassifierBuilder {
    origin: Url,
    font_css_host: String,
    font_cdn_hosts: Vec<String>,
    api_segment: String,
    static_paths: Vec<String>,
}

impl ClassifierBuilder {
    pub fn font_css_host(mut self, host: impl Into<String>) -> Self {
        self.font_css_host = host.into();
        self
    }

    pub fn font_cdn_hosts(mut self, hosts: Vec<String>) -> Self {
        self.font_cdn_hosts = hosts;
        self
    }

    pub fn api_segment(mut self, segment: impl Into<String>) -> Self {
        self.api_segment = segment.into();
        self
    }

    pub fn static_paths(mut self, paths: Vec<String>) -> Self {
        self.static_paths = paths;
        self
    }

    /// Compile the rule chain.
    pub fn build(self) -> Result<RequestClassifier, regex::Error> {
        let rules: Vec<Box<dyn ClassificationRule>> = vec![
            Box::new(HostRule {
                hosts: vec![self.font_css_host],
                route: Route::Passthrough,
            }),
            Box::new(PathRegexRule {
                pattern: Regex::new(FONT_EXTENSIONS)?,
                route: Route::Intercept(StrategyKind::Font),
            }),
            Box::new(HostRule {
                hosts: self.font_cdn_hosts,
                route: Route::Intercept(StrategyKind::Font),
            }),
            Box::new(PathSegmentRule {
                segment: self.api_segment,
                route: Route::Intercept(StrategyKind::Api),
            }),
            Box::new(PathRegexRule {
                pattern: Regex::new(IMAGE_EXTENSIONS)?,
                route: Route::Intercept(StrategyKind::Image),
            }),
            Box::new(DocumentRule),
            Box::new(ForeignOriginRule {
                origin: self.origin.origin(),
            }),
            Box::new(StaticAssetRule {
                paths: self.static_paths,
            }),
        ];

        Ok(RequestClassifier {
            origin: self.origin,
            rules,
        })
    }
}

/// Ordered rule chain mapping requests to routes.
pub struct RequestClassifier {
    origin: Url,
    rules: Vec<Box<dyn ClassificationRule>>,
}

impl fmt::Debug for RequestClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestClassifier")
            .field("origin", &self.origin.as_str())
            .field("rules_count", &self.rules.len())
            .finish()
    }
}

impl RequestClassifier {
    pub fn builder(origin: Url) -> ClassifierBuilder {
        ClassifierBuilder {
            origin,
            font_css_host: "fonts.googleapis.com".to_string(),
            font_cdn_hosts: vec!["fonts.gstatic.com".to_string()],
            api_segment: "/api/".to_string(),
            static_paths: Vec::new(),
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Classify a request. Non-GET requests always pass through.
    pub fn classify(&self, request: &HttpRequest) -> Route {
        if !request.is_get() {
            return Route::Passthrough;
        }
        let route = self
            .rules
            .iter()
            .find_map(|rule| rule.classify(request))
            .unwrap_or(Route::Intercept(StrategyKind::Default));
        trace!(url = %request.url, ?route, "classified request");
        route
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn classifier() -> RequestClassifier {
        RequestClassifier::builder(Url::parse("https://garage.test").unwrap())
            .static_paths(vec!["/".into(), "/manifest.json".into()])
            .build()
            .unwrap()
    }

    fn route(url: &str) -> Route {
        classifier().classify(&HttpRequest::parse_get(url).unwrap())
    }

    fn intercept(kind: StrategyKind) -> Route {
        Route::Intercept(kind)
    }

    #[test]
    fn test_font_css_provider_passes_through() {
        assert_eq!(
            route("https://fonts.googleapis.com/css2?family=Inter"),
            Route::Passthrough
        );
    }

    #[test]
    fn test_fonts() {
        assert_eq!(
            route("https://garage.test/static/inter.woff2"),
            intercept(StrategyKind::Font)
        );
        assert_eq!(
            route("https://garage.test/static/Inter.TTF"),
            intercept(StrategyKind::Font)
        );
        assert_eq!(
            route("https://fonts.gstatic.com/s/inter/v12/abc"),
            intercept(StrategyKind::Font)
        );
    }

    #[test]
    fn test_api_wins_over_image_extension() {
        assert_eq!(
            route("https://garage.test/api/cars/1"),
            intercept(StrategyKind::Api)
        );
        assert_eq!(
            route("https://garage.test/api/cars/1/photo.png"),
            intercept(StrategyKind::Api)
        );
        // API on another origin is still the API strategy
        assert_eq!(
            route("https://backend.test/api/repairing-service/bookings"),
            intercept(StrategyKind::Api)
        );
    }

    #[test]
    fn test_images() {
        assert_eq!(
            route("https://garage.test/images/car.JPG"),
            intercept(StrategyKind::Image)
        );
        assert_eq!(
            route("https://cdn.other.test/img/logo.svg"),
            intercept(StrategyKind::Image)
        );
    }

    #[test]
    fn test_pages() {
        assert_eq!(route("https://garage.test/"), intercept(StrategyKind::Page));
        assert_eq!(
            route("https://garage.test/bookings"),
            intercept(StrategyKind::Page)
        );
        assert_eq!(
            route("https://garage.test/about.html"),
            intercept(StrategyKind::Page)
        );
        // Extension-less paths on foreign origins are pages too (rule 5
        // comes before the origin check)
        assert_eq!(
            route("https://other.test/landing"),
            intercept(StrategyKind::Page)
        );
    }

    #[test]
    fn test_accept_header_marks_page() {
        let request = HttpRequest::parse_get("https://garage.test/app.js")
            .unwrap()
            .with_header("Accept", "text/html,application/xhtml+xml");
        assert_eq!(
            classifier().classify(&request),
            intercept(StrategyKind::Page)
        );
    }

    #[test]
    fn test_foreign_origin_passes_through() {
        assert_eq!(
            route("https://cdn.other.test/lib.js"),
            Route::Passthrough
        );
    }

    #[test]
    fn test_static_and_default() {
        assert_eq!(
            route("https://garage.test/manifest.json"),
            intercept(StrategyKind::StaticShell)
        );
        assert_eq!(
            route("https://garage.test/assets/app.js"),
            intercept(StrategyKind::Default)
        );
    }

    #[test]
    fn test_non_get_passes_through() {
        let request = HttpRequest::new(
            "POST",
            Url::parse("https://garage.test/api/repairing-service/bookings").unwrap(),
        );
        assert_eq!(classifier().classify(&request), Route::Passthrough);
    }

    #[test]
    fn test_custom_api_segment() {
        let classifier =
            RequestClassifier::builder(Url::parse("https://garage.test").unwrap())
                .api_segment("/v2/")
                .build()
                .unwrap();
        let request = HttpRequest::parse_get("https://garage.test/v2/cars").unwrap();
        assert_eq!(classifier.classify(&request), intercept(StrategyKind::Api));
        let request = HttpRequest::parse_get("https://garage.test/api/cars").unwrap();
        assert_eq!(classifier.classify(&request), intercept(StrategyKind::Page));
    }
}
