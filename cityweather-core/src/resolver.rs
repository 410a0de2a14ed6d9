//! City suggestions from a static gazetteer and coordinate resolution.

use std::sync::Arc;

use crate::{error::LocationError, geocode::ReverseGeocoder, model::Coordinates};

/// Minimum query length, in characters, before suggestions are offered.
pub const MIN_SUGGESTION_QUERY_CHARS: usize = 2;
pub const MAX_SUGGESTIONS: usize = 5;

pub const DEFAULT_GAZETTEER: &[&str] = &[
    "Київ",
    "Харків",
    "Одеса",
    "Дніпро",
    "Донецьк",
    "Запоріжжя",
    "Львів",
    "Кривий Ріг",
    "Миколаїв",
    "Маріуполь",
    "Луганськ",
    "Вінниця",
    "Макіївка",
    "Херсон",
    "Полтава",
    "Чернігів",
    "Черкаси",
    "Суми",
    "Житомир",
    "Хмельницький",
    "Чернівці",
    "Рівне",
    "Тернопіль",
    "Івано-Франківськ",
    "Луцьк",
    "Ужгород",
];

/// Case-insensitive prefix match over `gazetteer`, in gazetteer order.
pub fn suggest<'a, I>(gazetteer: I, query: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    if query.chars().count() < MIN_SUGGESTION_QUERY_CHARS {
        return Vec::new();
    }

    let needle = query.to_lowercase();
    gazetteer
        .into_iter()
        .filter(|city| city.to_lowercase().starts_with(&needle))
        .take(MAX_SUGGESTIONS)
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct CityResolver {
    gazetteer: Vec<String>,
    geocoder: Arc<dyn ReverseGeocoder>,
}

impl CityResolver {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self::with_gazetteer(geocoder, DEFAULT_GAZETTEER.iter().map(|c| c.to_string()).collect())
    }

    pub fn with_gazetteer(geocoder: Arc<dyn ReverseGeocoder>, gazetteer: Vec<String>) -> Self {
        Self { gazetteer, geocoder }
    }

    pub fn suggestions(&self, query: &str) -> Vec<String> {
        suggest(self.gazetteer.iter().map(String::as_str), query)
    }

    pub async fn resolve_from_coordinates(
        &self,
        coords: Coordinates,
    ) -> Result<String, LocationError> {
        let name = self.geocoder.locality(coords).await?;

        match name.map(|n| n.trim().to_string()) {
            Some(n) if !n.is_empty() => {
                tracing::info!(city = %n, "resolved location");
                Ok(n)
            }
            _ => Err(LocationError::NoLocality),
        }
    }
}
