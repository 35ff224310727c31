pub mod candidates;
pub mod score_cache;
pub mod search_cache;

pub use candidates::{CandidatesRepository, OutreachMessagesRepository, StoredCandidate};
pub use score_cache::ScoreCacheRepository;
pub use search_cache::SearchCacheRepository;
