use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{build_url, finish, Options};
use crate::classify::GeocodeRequest;
use crate::error::GeocodeError;
use crate::http::{describe, HttpAdapter};
use crate::models::{Address, AddressCollection, Bounds, MAX_ADMIN_LEVEL};
use crate::provider::normalize::{bounds_from_edges, parse_json, parse_pair};
use crate::provider::support::{fetch, preflight_geocode, preflight_reverse, Credential};
use crate::provider::{Capabilities, Provider};

const NAME: &str = "yandex";
const ENDPOINT: &str = "https://geocode-maps.yandex.ru/1.x/";

#[derive(Debug, Deserialize)]
struct Envelope {
    response: Body,
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(rename = "GeoObjectCollection")]
    collection: Collection,
}

#[derive(Debug, Deserialize)]
struct Collection {
    #[serde(default, rename = "featureMember")]
    members: Vec<Member>,
}

#[derive(Debug, Deserialize)]
struct Member {
    #[serde(rename = "GeoObject")]
    object: GeoObject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoObject {
    #[serde(rename = "Point")]
    point: Option<Pos>,
    bounded_by: Option<BoundedBy>,
    meta_data_property: Option<MetaData>,
}

#[derive(Debug, Deserialize)]
struct Pos {
    /// `"<longitude> <latitude>"`
    pos: String,
}

#[derive(Debug, Deserialize)]
struct BoundedBy {
    #[serde(rename = "Envelope")]
    envelope: Corners,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Corners {
    lower_corner: String,
    upper_corner: String,
}

#[derive(Debug, Deserialize)]
struct MetaData {
    #[serde(rename = "GeocoderMetaData")]
    geocoder: GeocoderMetaData,
}

#[derive(Debug, Deserialize)]
struct GeocoderMetaData {
    #[serde(rename = "Address")]
    address: Option<YandexAddress>,
}

#[derive(Debug, Deserialize)]
struct YandexAddress {
    country_code: Option<String>,
    postal_code: Option<String>,
    #[serde(default, rename = "Components")]
    components: Vec<Component>,
}

#[derive(Debug, Deserialize)]
struct Component {
    kind: String,
    name: String,
}

impl Corners {
    fn to_bounds(&self) -> Bounds {
        match (
            parse_pair(Some(&self.lower_corner)),
            parse_pair(Some(&self.upper_corner)),
        ) {
            (Some((west, south)), Some((east, north))) => {
                bounds_from_edges(Some(south), Some(west), Some(north), Some(east))
            }
            _ => Bounds::undefined(),
        }
    }
}

impl GeoObject {
    fn into_address(self) -> Address {
        let (lat, lon) = match self.point.as_ref().and_then(|p| parse_pair(Some(&p.pos))) {
            Some((lon, lat)) => (Some(lat), Some(lon)),
            None => (None, None),
        };
        let bounds = self
            .bounded_by
            .map(|b| b.envelope.to_bounds())
            .unwrap_or_default();

        let mut builder = Address::builder(NAME).coordinates(lat, lon).bounds(bounds);
        let Some(address) = self.meta_data_property.and_then(|m| m.geocoder.address) else {
            return builder.build();
        };

        builder = builder
            .country_code(address.country_code)
            .postal_code(address.postal_code);

        // provinces and areas fill admin levels from the top down
        let mut level = 1u8;
        for component in address.components {
            let name = Some(component.name);
            builder = match component.kind.as_str() {
                "country" => builder.country_name(name),
                "province" | "area" if level <= MAX_ADMIN_LEVEL => {
                    let next = builder.admin_level(level, name, None);
                    level += 1;
                    next
                }
                "locality" => builder.locality(name),
                "district" => builder.sub_locality(name),
                "street" => builder.street_name(name),
                "house" => builder.street_number(name),
                _ => builder,
            };
        }
        builder.build()
    }
}

/// Yandex Geocoder. The API key is optional for low-volume use.
pub struct Yandex {
    http: Arc<dyn HttpAdapter>,
    api_key: Credential,
    toponym: Option<String>,
    options: Options,
}

impl Yandex {
    pub fn new(http: Arc<dyn HttpAdapter>) -> Self {
        Self {
            http,
            api_key: Credential::none(),
            toponym: None,
            options: Options::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: Credential) -> Self {
        self.api_key = api_key;
        self
    }

    /// Toponym kind for reverse lookups: `house`, `street`, `metro`,
    /// `district` or `locality`.
    pub fn with_toponym(mut self, kind: impl Into<String>) -> Self {
        self.toponym = Some(kind.into());
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    async fn execute(
        &self,
        geocode: &str,
        toponym: Option<&str>,
    ) -> Result<AddressCollection, GeocodeError> {
        let limit = self.options.limit_param();
        let mut params = vec![
            ("format", "json"),
            ("geocode", geocode),
            ("results", limit.as_str()),
        ];
        if let Some(locale) = &self.options.locale {
            params.push(("lang", locale.as_str()));
        }
        if let Some(kind) = toponym {
            params.push(("kind", kind));
        }
        if let Some(key) = self.api_key.as_deref() {
            params.push(("apikey", key));
        }
        let url = build_url(NAME, ENDPOINT, &params)?;
        let description = describe(&url);

        let body = fetch(self.http.as_ref(), NAME, &url).await?;
        let envelope: Envelope = parse_json(NAME, &body, &description)?;
        let addresses = envelope
            .response
            .collection
            .members
            .into_iter()
            .map(|m| m.object.into_address())
            .collect();
        finish(NAME, &description, addresses, self.options.limit)
    }
}

#[async_trait]
impl Provider for Yandex {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ADDRESS
    }

    async fn geocode_request(
        &self,
        request: &GeocodeRequest,
    ) -> Result<AddressCollection, GeocodeError> {
        if let Some(local) = preflight_geocode(NAME, self.capabilities(), request)? {
            return Ok(local);
        }
        self.execute(request.text(), None).await
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AddressCollection, GeocodeError> {
        preflight_reverse(NAME, self.capabilities(), latitude, longitude)?;
        // Yandex expects "longitude,latitude"
        let position = format!("{},{}", longitude, latitude);
        self.execute(&position, self.toponym.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::mock::MockHttp;

    const MOSCOW: &str = r#"{
        "response": {
            "GeoObjectCollection": {
                "metaDataProperty": {"GeocoderResponseMetaData": {"request": "Тверская 6", "found": "1", "results": "5"}},
                "featureMember": [{
                    "GeoObject": {
                        "metaDataProperty": {
                            "GeocoderMetaData": {
                                "kind": "house",
                                "text": "Россия, Москва, Тверская улица, 6с1",
                                "Address": {
                                    "country_code": "RU",
                                    "postal_code": "125009",
                                    "formatted": "Россия, Москва, Тверская улица, 6с1",
                                    "Components": [
                                        {"kind": "country", "name": "Россия"},
                                        {"kind": "province", "name": "Центральный федеральный округ"},
                                        {"kind": "province", "name": "Москва"},
                                        {"kind": "locality", "name": "Москва"},
                                        {"kind": "street", "name": "Тверская улица"},
                                        {"kind": "house", "name": "6с1"}
                                    ]
                                }
                            }
                        },
                        "boundedBy": {"Envelope": {"lowerCorner": "37.607031 55.756307", "upperCorner": "37.615242 55.760936"}},
                        "Point": {"pos": "37.611136 55.758622"}
                    }
                }]
            }
        }
    }"#;

    #[tokio::test]
    async fn test_geocode() {
        let http = Arc::new(MockHttp::with_body(MOSCOW));
        let provider = Yandex::new(http.clone()).with_options(Options::default().with_locale("ru_RU"));
        let results = provider.geocode("Тверская 6").await.unwrap();
        let address = results.first().unwrap();

        assert_eq!(address.point().latitude(), Some(55.758622));
        assert_eq!(address.point().longitude(), Some(37.611136));
        assert_eq!(address.bounds().west(), Some(37.607031));
        assert_eq!(address.bounds().north(), Some(55.760936));
        assert_eq!(address.street_number(), Some("6с1"));
        assert_eq!(address.street_name(), Some("Тверская улица"));
        assert_eq!(address.locality(), Some("Москва"));
        assert_eq!(address.postal_code(), Some("125009"));
        assert_eq!(
            address.admin_levels().get(1).and_then(|l| l.name()),
            Some("Центральный федеральный округ")
        );
        assert_eq!(address.admin_levels().get(2).and_then(|l| l.name()), Some("Москва"));
        assert_eq!(address.country().name(), Some("Россия"));
        assert_eq!(address.country().code(), Some("RU"));
        assert!(http.last_url().unwrap().contains("lang=ru_RU"));
    }

    #[tokio::test]
    async fn test_reverse_sends_lon_lat() {
        let http = Arc::new(MockHttp::with_body(MOSCOW));
        let provider = Yandex::new(http.clone()).with_toponym("house");
        provider.reverse(55.758622, 37.611136).await.unwrap();
        let url = http.last_url().unwrap();
        assert!(url.contains("geocode=37.611136%2C55.758622"));
        assert!(url.contains("kind=house"));
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let body = r#"{"response": {"GeoObjectCollection": {"featureMember": []}}}"#;
        let provider = Yandex::new(Arc::new(MockHttp::with_body(body)));
        let err = provider.geocode("nowhere").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoResult);
    }

    #[tokio::test]
    async fn test_rejected_key_status() {
        let provider = Yandex::new(Arc::new(MockHttp::with_status(403)))
            .with_api_key(Credential::new("bad-key"));
        let err = provider.geocode("Москва").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        assert!(!err.to_string().contains("bad-key"));
    }

    #[tokio::test]
    async fn test_ip_query_is_unsupported() {
        let provider = Yandex::new(Arc::new(MockHttp::forbidden()));
        for ip in ["88.188.221.14", "2001:db8::1"] {
            let err = provider.geocode(ip).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedOperation, "{}", ip);
            assert_eq!(err.request(), ip);
        }
    }
}
