use chrono::{Months, NaiveDate};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::util::{join_path, UrlValidationError};

/// Which locale parameter a template sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    Language,
    Region,
}

/// Query parameters computed when the URL is built rather than fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicParam {
    /// `primary_release_date.gte` set to one calendar month before today.
    ReleasedWithinLastMonth,
}

/// A remote-query template: an endpoint path plus its fixed filters.
///
/// The API key, locale and page number are supplied by [`ApiEndpoint`] when a
/// template is turned into a URL, so templates stay free of secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTemplate {
    pub path: &'static str,
    pub params: &'static [(&'static str, &'static str)],
    pub locale: Locale,
    pub dynamic: Option<DynamicParam>,
}

impl QueryTemplate {
    /// Template with the usual `language` locale and no dynamic parameters.
    pub const fn new(path: &'static str, params: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            path,
            params,
            locale: Locale::Language,
            dynamic: None,
        }
    }

    pub const fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub const fn with_dynamic(mut self, dynamic: DynamicParam) -> Self {
        self.dynamic = Some(dynamic);
        self
    }
}

const POPULARITY: (&str, &str) = ("sort_by", "popularity.desc");

/// Multi-search; the query text is appended per request.
pub const SEARCH_MULTI: QueryTemplate = QueryTemplate::new("/search/multi", &[]);

/// `discover/movie` filtered by a genre id, most popular first.
pub const fn discover_movies(genre: &'static [(&'static str, &'static str)]) -> QueryTemplate {
    QueryTemplate::new("/discover/movie", genre)
}

/// `discover/tv` filtered by a genre or network id, most popular first.
pub const fn discover_series(filter: &'static [(&'static str, &'static str)]) -> QueryTemplate {
    QueryTemplate::new("/discover/tv", filter)
}

pub(crate) const SORT_POPULAR: &[(&str, &str)] = &[POPULARITY];

/// Base URL, credentials and locale for the catalog API.
pub struct ApiEndpoint {
    base: Url,
    api_key: SecretString,
    language: String,
    region: String,
}

impl std::fmt::Debug for ApiEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiEndpoint")
            .field("base", &self.base.as_str())
            .field("api_key", &"[REDACTED]")
            .field("language", &self.language)
            .field("region", &self.region)
            .finish()
    }
}

impl ApiEndpoint {
    pub fn new(
        base: Url,
        api_key: SecretString,
        language: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            base,
            api_key,
            language: language.into(),
            region: region.into(),
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Builds the request URL for one page of a template.
    ///
    /// Parameter order: `api_key`, the template's fixed filters, the dynamic
    /// date filter, the locale, any `extra` pairs, then `page`.
    pub fn url_for(
        &self,
        template: &QueryTemplate,
        page: Option<u32>,
        extra: &[(&str, &str)],
        today: NaiveDate,
    ) -> Result<Url, UrlValidationError> {
        let mut url = join_path(&self.base, template.path)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", self.api_key.expose_secret());
            for (key, value) in template.params {
                query.append_pair(key, value);
            }
            if let Some(DynamicParam::ReleasedWithinLastMonth) = template.dynamic {
                query.append_pair(
                    "primary_release_date.gte",
                    &one_month_before(today).format("%Y-%m-%d").to_string(),
                );
            }
            match template.locale {
                Locale::Language => query.append_pair("language", &self.language),
                Locale::Region => query.append_pair("region", &self.region),
            };
            for (key, value) in extra {
                query.append_pair(key, value);
            }
            if let Some(page) = page {
                query.append_pair("page", &page.to_string());
            }
        }
        Ok(url)
    }

    /// URL of a single movie or show (`/movie/{id}`, `/tv/{id}`).
    pub fn detail_url(&self, segment: &str, id: u64) -> Result<Url, UrlValidationError> {
        let mut url = join_path(&self.base, &format!("{}/{}", segment, id))?;
        url.query_pairs_mut()
            .append_pair("api_key", self.api_key.expose_secret())
            .append_pair("language", &self.language);
        Ok(url)
    }
}

/// Same day one calendar month earlier, clamped to the end of shorter months.
pub fn one_month_before(today: NaiveDate) -> NaiveDate {
    today.checked_sub_months(Months::new(1)).unwrap_or(today)
}
