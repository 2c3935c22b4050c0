//! Fixed word lists and derived forms

use fake::faker::lorem::en::{Sentence, Word};
use fake::Fake;
use mocknest_core::WordProvider;
use rand::{rng, Rng};

const FIRST_NAMES: &[&str] = &[
    "Alex", "Sam", "Taylor", "Jordan", "Casey", "Riley", "Morgan", "Jamie", "Avery", "Quinn",
    "Elena", "Marcus", "Priya", "Diego", "Ingrid", "Kenji", "Amara", "Felix", "Nadia", "Oscar",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Lee", "Patel", "Garcia", "Kim", "Brown", "Okafor", "Novak", "Silva", "Haddad",
    "Johansson", "Moreau", "Tanaka", "Kowalski", "Ivanov", "Costa",
];

const CITIES: &[&str] = &[
    "Lisbon", "Oslo", "Kyoto", "Austin", "Nairobi", "Montreal", "Valparaiso", "Gdansk",
    "Wellington", "Porto", "Tallinn", "Cusco",
];

const COUNTRIES: &[&str] = &[
    "Portugal", "Norway", "Japan", "Kenya", "Canada", "Chile", "Poland", "New Zealand",
    "Estonia", "Peru", "Iceland", "Uruguay",
];

const COMPANIES: &[&str] = &[
    "Acme Corp", "Globex", "Initech", "Umbrella Labs", "Stark Industries", "Wayne Enterprises",
    "Hooli", "Vandelay Industries", "Wonka Works", "Tyrell Corp",
];

const JOB_TITLES: &[&str] = &[
    "Software Engineer", "Product Manager", "Data Analyst", "Site Reliability Engineer",
    "UX Designer", "QA Engineer", "Solutions Architect", "Technical Writer",
    "Engineering Manager", "Security Analyst",
];

const STREETS: &[&str] = &[
    "Main St", "Oak Ave", "Maple Dr", "Cedar Ln", "Harbor Rd", "Elm St", "Sunset Blvd",
    "River Way",
];

fn pick(list: &[&str]) -> String {
    list[rng().random_range(0..list.len())].to_string()
}

/// Template word source backed by the fixed lists above, with lorem text
/// delegated to the `fake` crate
#[derive(Debug, Default)]
pub struct WordListProvider;

impl WordListProvider {
    /// Create a provider
    pub fn new() -> Self {
        Self
    }
}

impl WordProvider for WordListProvider {
    fn first_name(&self) -> String {
        pick(FIRST_NAMES)
    }

    fn last_name(&self) -> String {
        pick(LAST_NAMES)
    }

    fn full_name(&self) -> String {
        format!("{} {}", self.first_name(), self.last_name())
    }

    fn city(&self) -> String {
        pick(CITIES)
    }

    fn country(&self) -> String {
        pick(COUNTRIES)
    }

    fn company(&self) -> String {
        pick(COMPANIES)
    }

    fn job_title(&self) -> String {
        pick(JOB_TITLES)
    }

    fn email(&self) -> String {
        format!(
            "{}.{}@example.com",
            self.first_name().to_lowercase(),
            self.last_name().to_lowercase()
        )
    }

    fn username(&self) -> String {
        format!(
            "{}{}",
            self.first_name().to_lowercase(),
            rng().random_range(100..=999)
        )
    }

    fn address(&self) -> String {
        format!("{} {}", rng().random_range(1..=9999), pick(STREETS))
    }

    fn word(&self) -> String {
        Word().fake()
    }

    fn sentence(&self) -> String {
        Sentence(3..8).fake()
    }
}
