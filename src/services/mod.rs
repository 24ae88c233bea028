pub mod feed;
pub mod matching;
pub mod page_cache;
pub mod pagination;
pub mod stores;
pub mod swipes;

pub use feed::{FeedGenerator, FeedRequest, TieBreak};
pub use matching::MatchChecker;
pub use page_cache::{MemoryPageCache, PageCache};
pub use pagination::Deck;
pub use stores::{
    GroupStore, MatchStore, PreferenceStore, ProfileStore, SwipeStore, TitleQuery, TitleStore,
};
pub use swipes::{SwipeGate, SwipeOutcome, SwipeService};
