/// Background music categories
///
/// A category is a named group of interchangeable tracks. Built-in topics get
/// a dedicated battle category; every other topic shares `custom`, whose
/// track list is filled at runtime from the manifest.
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::AudioError;

/// Quiz topics that ship with dedicated music
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltInTopic {
    Ai,
    Cs,
    Philosophy,
}

impl BuiltInTopic {
    /// Match a free-form topic string, case-insensitive.
    pub fn parse(topic: &str) -> Option<Self> {
        match topic.trim().to_lowercase().as_str() {
            "ai" | "artificial intelligence" => Some(BuiltInTopic::Ai),
            "cs" | "computer science" => Some(BuiltInTopic::Cs),
            "philosophy" | "phil" => Some(BuiltInTopic::Philosophy),
            _ => None,
        }
    }
}

/// Music category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Title and menu screens
    Menu,

    /// Battle music for a built-in topic
    Battle(BuiltInTopic),

    /// Battle music for user-supplied topics
    Custom,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Menu,
        Category::Battle(BuiltInTopic::Ai),
        Category::Battle(BuiltInTopic::Cs),
        Category::Battle(BuiltInTopic::Philosophy),
        Category::Custom,
    ];

    /// Category to use for a battle on `topic`
    pub fn for_topic(topic: &str) -> Self {
        match BuiltInTopic::parse(topic) {
            Some(builtin) => Category::Battle(builtin),
            None => Category::Custom,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Menu => "menu",
            Category::Battle(BuiltInTopic::Ai) => "battle_ai",
            Category::Battle(BuiltInTopic::Cs) => "battle_cs",
            Category::Battle(BuiltInTopic::Philosophy) => "battle_philosophy",
            Category::Custom => "custom",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AudioError::UnknownCategory(s.to_string()))
    }
}

/// Track lists per category.
///
/// Lists are swapped whole, never edited in place, so a reader holding an
/// `Arc` keeps a consistent snapshot.
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    tracks: HashMap<Category, Arc<[String]>>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in layout of the `bgm/` asset folder
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.replace(Category::Menu, vec!["menu/menu_1.mp3".to_string()]);
        for topic in [BuiltInTopic::Ai, BuiltInTopic::Cs, BuiltInTopic::Philosophy] {
            let category = Category::Battle(topic);
            registry.replace(
                category,
                (1..=2).map(|n| format!("{}/battle_{}.mp3", category, n)).collect(),
            );
        }
        registry.replace(Category::Custom, vec!["custom/fallback.mp3".to_string()]);
        registry
    }

    /// Swap in a new track list for `category`
    pub fn replace(&mut self, category: Category, tracks: Vec<String>) {
        tracing::debug!("Category {} now has {} track(s)", category, tracks.len());
        self.tracks.insert(category, tracks.into());
    }

    /// Current track list, rejecting empty or missing lists
    pub fn tracks(&self, category: Category) -> Result<Arc<[String]>, AudioError> {
        match self.tracks.get(&category) {
            Some(list) if !list.is_empty() => Ok(Arc::clone(list)),
            _ => Err(AudioError::EmptyCategory(category.to_string())),
        }
    }

    pub fn len(&self, category: Category) -> usize {
        self.tracks.get(&category).map(|l| l.len()).unwrap_or(0)
    }
}

/// Registry shared between the audio thread and the manifest loader
pub type SharedRegistry = Arc<RwLock<CategoryRegistry>>;

pub fn shared(registry: CategoryRegistry) -> SharedRegistry {
    Arc::new(RwLock::new(registry))
}
