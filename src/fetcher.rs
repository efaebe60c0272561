use std::{cell::RefCell, collections::HashMap, io::Read};

use chrono::NaiveDate;
use log::{debug, info, warn};
use thiserror::Error;
use url::Url;

use crate::config::UrlTemplate;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no data published at {url} (status {status})")]
    NotPublished { url: Url, status: u16 },
    #[error("unable to reach {url}: {message}")]
    Transport { url: Url, message: String },
    #[error("unable to read response from {url}")]
    Read {
        url: Url,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid url for {date}")]
    InvalidUrl {
        date: NaiveDate,
        #[source]
        source: url::ParseError,
    },
}

/// Where the daily export of a given date comes from.
pub trait Source {
    fn fetch(&self, date: NaiveDate) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug)]
pub struct HttpSource {
    template: UrlTemplate,
}

impl HttpSource {
    pub fn new(template: UrlTemplate) -> HttpSource {
        HttpSource { template }
    }
}

impl Source for HttpSource {
    fn fetch(&self, date: NaiveDate) -> Result<Vec<u8>, FetchError> {
        let url = self
            .template
            .for_date(date)
            .map_err(|source| FetchError::InvalidUrl { date, source })?;
        debug!("GET {}", url);

        let response = match ureq::request_url("GET", &url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(FetchError::NotPublished { url, status })
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(FetchError::Transport {
                    url,
                    message: transport.to_string(),
                })
            }
        };

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|source| FetchError::Read {
                url: url.clone(),
                source,
            })?;
        info!("downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

/// Remembers successful fetches per date for as long as the caller keeps it.
///
/// A single `load_latest` never asks for the same date twice, so a one-shot
/// run gains nothing from it. It is the cache boundary for callers that keep
/// the source alive across several loads.
pub struct Memoized<S> {
    inner: S,
    fetched: RefCell<HashMap<NaiveDate, Vec<u8>>>,
}

impl<S: Source> Memoized<S> {
    pub fn new(inner: S) -> Memoized<S> {
        Memoized {
            inner,
            fetched: RefCell::new(HashMap::new()),
        }
    }
}

impl<S: Source> Source for Memoized<S> {
    fn fetch(&self, date: NaiveDate) -> Result<Vec<u8>, FetchError> {
        if let Some(body) = self.fetched.borrow().get(&date) {
            debug!("using memoized export of {}", date);
            return Ok(body.clone());
        }
        let body = self.inner.fetch(date)?;
        self.fetched.borrow_mut().insert(date, body.clone());
        Ok(body)
    }
}

/// Fetch the export of `today`, falling back to the day before when today's
/// has not been published yet. Returns the date actually used.
pub fn load_latest<S: Source>(
    source: &S,
    today: NaiveDate,
) -> Result<(NaiveDate, Vec<u8>), FetchError> {
    match source.fetch(today) {
        Ok(body) => Ok((today, body)),
        Err(FetchError::NotPublished { url, status }) => {
            let yesterday = match today.pred_opt() {
                Some(yesterday) => yesterday,
                None => return Err(FetchError::NotPublished { url, status }),
            };
            warn!(
                "{} not available (status {}), trying {}",
                url, status, yesterday
            );
            source.fetch(yesterday).map(|body| (yesterday, body))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    struct FakeSource {
        published: Vec<NaiveDate>,
        calls: RefCell<Vec<NaiveDate>>,
    }

    impl FakeSource {
        fn new(published: Vec<NaiveDate>) -> FakeSource {
            FakeSource {
                published,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Source for FakeSource {
        fn fetch(&self, date: NaiveDate) -> Result<Vec<u8>, FetchError> {
            self.calls.borrow_mut().push(date);
            let url = UrlTemplate::from_str("http://localhost/export-{}.csv")
                .unwrap()
                .for_date(date)
                .unwrap();
            if self.published.contains(&date) {
                Ok(date.to_string().into_bytes())
            } else {
                Err(FetchError::NotPublished { url, status: 404 })
            }
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, day).unwrap()
    }

    #[test]
    fn test_uses_today_when_published() {
        let source = FakeSource::new(vec![date(15), date(16)]);
        let (used, body) = load_latest(&source, date(16)).unwrap();
        assert_eq!(used, date(16));
        assert_eq!(body, b"2020-03-16".to_vec());
        assert_eq!(*source.calls.borrow(), vec![date(16)]);
    }

    #[test]
    fn test_falls_back_to_yesterday_once() {
        let source = FakeSource::new(vec![date(15)]);
        let (used, _) = load_latest(&source, date(16)).unwrap();
        assert_eq!(used, date(15));
        assert_eq!(*source.calls.borrow(), vec![date(16), date(15)]);

        let source = FakeSource::new(vec![date(14)]);
        match load_latest(&source, date(16)) {
            Err(FetchError::NotPublished { status, .. }) => assert_eq!(status, 404),
            result => panic!("Unexpected result: {:?}", result.map(|(d, _)| d)),
        }
        assert_eq!(*source.calls.borrow(), vec![date(16), date(15)]);
    }

    #[test]
    fn test_memoized_serves_repeated_loads() {
        let memoized = Memoized::new(FakeSource::new(vec![date(15)]));
        for _ in 0..3 {
            let (used, _) = load_latest(&memoized, date(16)).unwrap();
            assert_eq!(used, date(15));
        }
        // the unpublished day is asked again every time, the fallback only once
        assert_eq!(
            *memoized.inner.calls.borrow(),
            vec![date(16), date(15), date(16), date(16)]
        );
    }

    #[test]
    fn test_memoized_fetches_each_date_once() {
        let memoized = Memoized::new(FakeSource::new(vec![date(15)]));
        assert!(memoized.fetch(date(15)).is_ok());
        assert!(memoized.fetch(date(15)).is_ok());
        assert!(memoized.fetch(date(16)).is_err());
        assert!(memoized.fetch(date(16)).is_err());
        assert_eq!(
            *memoized.inner.calls.borrow(),
            vec![date(15), date(16), date(16)]
        );
    }
}
