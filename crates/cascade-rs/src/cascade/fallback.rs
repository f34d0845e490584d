//! Deterministic terminal fallback.
//!
//! [`DeterministicFallback::generate`] is pure, offline and total: every
//! input (including the empty string) yields the same non-empty text on
//! every call. The query is matched against a small set of intent
//! strategies; the first match renders a template chosen by a hash of the
//! query, filled with the place named in the query when there is one.

use regex::Regex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::LazyLock;
use tracing::warn;

/// Place phrase following "in", "near" or "around".
static PLACE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:in|near|around)\s+([a-z][a-z .'-]*[a-z])").ok());

/// Words that end a place phrase ("Austin tonight" → "Austin").
const PLACE_STOP_WORDS: &[&str] = &[
    "in", "on", "at", "for", "this", "next", "tonight", "today", "tomorrow", "now", "with", "and",
    "or", "during", "right", "open", "that", "which",
];

/// Phrases that name no particular place.
const NON_PLACES: &[&str] = &["area", "town", "the city", "city", "me", "here", "my area", "the area"];

/// Placeholder used when the query names no place.
pub const NO_PLACE: &str = "your area";

/// Returned if every strategy misbehaves. Never expected in practice.
const LAST_RESORT: &str = "We couldn't reach any of our information sources right now. \
     Try a nearby neighborhood guide, a local events calendar, or ask again in a moment.";

/// Extract and title-case the place named in a query, if any.
///
/// ```ignore
/// assert_eq!(extract_place("live jazz in new orleans tonight"), Some("New Orleans".into()));
/// assert_eq!(extract_place("good tacos"), None);
/// ```
pub fn extract_place(query: &str) -> Option<String> {
    let caps = PLACE_RE.as_ref()?.captures(query)?;
    let phrase = caps.get(1)?.as_str();

    let mut words: Vec<&str> = phrase
        .split_whitespace()
        .take_while(|w| !PLACE_STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .collect();
    if words.first().is_some_and(|w| w.eq_ignore_ascii_case("the")) && words.len() > 1 {
        words.remove(0);
    }
    let joined = words.join(" ");
    let trimmed = joined.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.is_empty() || NON_PLACES.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }
    Some(title_case(trimmed))
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// What a strategy sees about the query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryContext {
    /// Trimmed original query.
    pub query: String,
    /// Lowercased query, for matching.
    pub query_lower: String,
    /// Place named in the query, if any.
    pub place: Option<String>,
}

impl QueryContext {
    pub fn new(query: &str) -> Self {
        let query = query.trim().to_string();
        Self {
            query_lower: query.to_lowercase(),
            place: extract_place(&query),
            query,
        }
    }

    /// The place, or [`NO_PLACE`].
    pub fn place_or_default(&self) -> &str {
        self.place.as_deref().unwrap_or(NO_PLACE)
    }

    /// Stable hash of the lowercased query.
    pub fn fingerprint(&self) -> u64 {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in self.query_lower.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        hash
    }

    /// Whether the query mentions `keyword` as a whole word, or contains
    /// it when it is a phrase.
    pub fn mentions(&self, keyword: &str) -> bool {
        if keyword.contains(' ') {
            return self.query_lower.contains(keyword);
        }
        self.query_lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .any(|w| w == keyword)
    }
}

/// One intent category of the fallback generator.
///
/// Must be pure: same context in, same text out.
pub trait FallbackStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, ctx: &QueryContext) -> bool;

    fn render(&self, ctx: &QueryContext) -> String;
}

/// A keyword-triggered strategy rendering one of a fixed set of templates.
///
/// Templates use `{place}` for the extracted place. The template is picked by
/// the query fingerprint, so equal queries always get equal text.
#[derive(Clone, Debug)]
pub struct TemplateStrategy {
    name: &'static str,
    keywords: &'static [&'static str],
    templates: &'static [&'static str],
}

impl TemplateStrategy {
    pub const fn new(
        name: &'static str,
        keywords: &'static [&'static str],
        templates: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            keywords,
            templates,
        }
    }
}

impl FallbackStrategy for TemplateStrategy {
    fn name(&self) -> &str {
        self.name
    }

    /// An empty keyword list matches everything.
    fn matches(&self, ctx: &QueryContext) -> bool {
        self.keywords.is_empty() || self.keywords.iter().any(|k| ctx.mentions(k))
    }

    fn render(&self, ctx: &QueryContext) -> String {
        if self.templates.is_empty() {
            return String::new();
        }
        let index = (ctx.fingerprint() % self.templates.len() as u64) as usize;
        let template = self.templates.get(index).copied().unwrap_or_default();
        let mut text = template.replace("{place}", ctx.place_or_default());
        if let Some(note) = ctx.place.as_deref().and_then(city_note) {
            text.push(' ');
            text.push_str(note);
        }
        text
    }
}

/// Canned local color for well-known cities.
const CITY_NOTES: &[(&str, &str)] = &[
    (
        "austin",
        "Austin is known for live music on Red River and Sixth Street, Tex-Mex and barbecue, and swimming at Barton Springs.",
    ),
    (
        "chicago",
        "Chicago is known for its architecture, the Lakefront Trail, deep-dish pizza, and blues clubs on the South Side.",
    ),
    (
        "nashville",
        "Nashville is known for honky-tonks on Lower Broadway, the Ryman Auditorium, and hot chicken.",
    ),
    (
        "new orleans",
        "New Orleans is known for jazz on Frenchmen Street, Creole cooking, and year-round festivals.",
    ),
    (
        "new york",
        "New York is known for Broadway theaters, world-class museums, and late-night food in every borough.",
    ),
    (
        "seattle",
        "Seattle is known for Pike Place Market, a deep coffee culture, and quick trips to mountain trails.",
    ),
    (
        "san francisco",
        "San Francisco is known for its neighborhoods, waterfront walks, and an inventive restaurant scene.",
    ),
];

fn city_note(place: &str) -> Option<&'static str> {
    let lower = place.to_lowercase();
    CITY_NOTES
        .iter()
        .find(|(city, _)| lower == *city || lower.ends_with(&format!(" {city}")))
        .map(|(_, note)| *note)
}

pub const EVENTS: TemplateStrategy = TemplateStrategy::new(
    "events",
    &[
        "event", "events", "concert", "concerts", "show", "shows", "festival", "festivals", "gig",
        "gigs", "tickets", "happening", "what's on", "live music",
    ],
    &[
        "Looking for events in {place}? Check the weekly listings from local venues and community calendars, \
         and look for free outdoor concerts and markets on weekends. Popular shows sell out, so book early.",
        "For things happening in {place}, start with venue calendars and the local alt-weekly, then check \
         neighborhood festivals and pop-up markets. Weeknight shows are usually easier to get into.",
        "Events in {place} change week to week. Venue websites, ticketing pages and community boards are the \
         most reliable sources, and many smaller shows only announce a few days ahead.",
    ],
);

pub const DINING: TemplateStrategy = TemplateStrategy::new(
    "dining",
    &[
        "food", "eat", "eats", "restaurant", "restaurants", "dinner", "lunch", "brunch", "breakfast",
        "taco", "tacos", "bbq", "barbecue", "pizza", "cafe", "coffee", "dining", "hungry",
    ],
    &[
        "Hungry in {place}? Neighborhood spots with short menus and long lines are usually a safe bet, and food \
         trucks and markets are great for trying a little of everything. Reserve ahead for weekend dinners.",
        "For food in {place}, mix one well-known local favorite with a few smaller neighborhood places. Lunch \
         specials are often the cheapest way to try popular restaurants.",
        "Eating out in {place}: look for places busy with locals, check opening hours before heading out, and \
         ask about daily specials. Brunch spots fill up fast on weekends.",
    ],
);

pub const NIGHTLIFE: TemplateStrategy = TemplateStrategy::new(
    "nightlife",
    &[
        "bar", "bars", "club", "clubs", "nightlife", "drinks", "cocktail", "cocktails", "brewery",
        "breweries", "pub", "pubs", "late night", "dancing",
    ],
    &[
        "For a night out in {place}, start at a relaxed bar for happy hour, then head to a neighborhood with \
         several venues within walking distance. Check cover charges and door times before you go.",
        "Nightlife in {place} tends to cluster in a few districts. Breweries and cocktail bars are good early \
         in the evening; clubs and late shows pick up after ten.",
        "Going out in {place}? Look for bars with live music or trivia nights on weekdays, and plan a safe ride \
         home ahead of time.",
    ],
);

pub const OUTDOORS: TemplateStrategy = TemplateStrategy::new(
    "outdoors",
    &[
        "park", "parks", "hike", "hiking", "trail", "trails", "outdoor", "outdoors", "swim", "swimming",
        "lake", "river", "bike", "biking", "kayak", "picnic",
    ],
    &[
        "To get outside in {place}, look for city parks with marked trails, riverside paths, and public \
         swimming spots. Go early on hot days and bring water.",
        "Outdoor options around {place} usually include greenbelts, lakes and bike paths. Park websites list \
         trail conditions and closures, which change after heavy rain.",
        "For fresh air in {place}, try a short loop trail or a picnic at a large public park. Rentals for bikes \
         and kayaks are often available near the water.",
    ],
);

pub const VENUES: TemplateStrategy = TemplateStrategy::new(
    "venues",
    &[
        "venue", "venues", "museum", "museums", "gallery", "galleries", "theater", "theatre", "stadium",
        "arena", "attraction", "attractions", "landmark", "landmarks", "sightseeing",
    ],
    &[
        "Notable venues in {place} include its main museums, historic theaters and performance halls. Many \
         museums have a free or discounted day each week.",
        "For sightseeing in {place}, combine one major landmark with a smaller gallery or historic district \
         nearby. Check opening days, since many venues close early in the week.",
        "Venues worth a visit in {place} range from large arenas to small independent galleries. Guided tours \
         are a good way to see a lot in a short time.",
    ],
);

pub const GENERAL: TemplateStrategy = TemplateStrategy::new(
    "general",
    &[],
    &[
        "Here are some ideas for exploring {place}: browse a local events calendar, try a well-reviewed \
         neighborhood restaurant, and spend some time in a public park or museum.",
        "We couldn't find a specific answer right now, but {place} usually has something going on. Local \
         venue calendars, neighborhood guides and visitor centers are good places to start.",
        "A good way to discover {place} is to pick a walkable neighborhood and wander: cafes, shops, small \
         venues and parks tend to be close together.",
    ],
);

/// Offline last-resort responder.
pub struct DeterministicFallback {
    strategies: Vec<Box<dyn FallbackStrategy>>,
}

impl std::fmt::Debug for DeterministicFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("DeterministicFallback")
            .field("strategies", &names)
            .finish()
    }
}

impl Default for DeterministicFallback {
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(EVENTS),
                Box::new(DINING),
                Box::new(NIGHTLIFE),
                Box::new(OUTDOORS),
                Box::new(VENUES),
            ],
        }
    }
}

impl DeterministicFallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator with no intent strategies: everything renders through
    /// the general templates.
    pub fn general_only() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Add a strategy (builder pattern). Custom strategies are consulted
    /// before the built-in ones, in registration order.
    pub fn with_strategy(mut self, strategy: impl FallbackStrategy + 'static) -> Self {
        let custom = self.custom_count();
        self.strategies.insert(custom, Box::new(strategy));
        self
    }

    fn custom_count(&self) -> usize {
        let builtin = [EVENTS.name, DINING.name, NIGHTLIFE.name, OUTDOORS.name, VENUES.name];
        self.strategies
            .iter()
            .position(|s| builtin.contains(&s.name()))
            .unwrap_or(self.strategies.len())
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies
            .iter()
            .map(|s| s.name())
            .chain(std::iter::once(GENERAL.name))
            .collect()
    }

    /// Name of the strategy that handles `query`.
    pub fn classify(&self, query: &str) -> &str {
        let ctx = QueryContext::new(query);
        self.strategies
            .iter()
            .find(|s| s.matches(&ctx))
            .map(|s| s.name())
            .unwrap_or(GENERAL.name)
    }

    /// Render the fallback answer for `query`. Never empty.
    pub fn generate(&self, query: &str) -> String {
        let ctx = QueryContext::new(query);
        for strategy in &self.strategies {
            let rendered = catch_unwind(AssertUnwindSafe(|| {
                strategy.matches(&ctx).then(|| strategy.render(&ctx))
            }));
            match rendered {
                Ok(Some(text)) if !text.trim().is_empty() => return text,
                Ok(Some(_)) => warn!("Fallback strategy '{}' rendered empty text", strategy.name()),
                Ok(None) => {}
                Err(_) => warn!("Fallback strategy '{}' panicked", strategy.name()),
            }
        }
        let text = GENERAL.render(&ctx);
        if text.trim().is_empty() {
            LAST_RESORT.to_string()
        } else {
            text
        }
    }
}
