/// Defaults tied to the layout of the survey export this pipeline was built for.
/// Every value here can be overridden through `PipelineConfig`.

// Default file locations (relative to the working directory)
pub const DEFAULT_INPUT_PATH: &str = "Data.csv";
pub const DEFAULT_CLEANED_PATH: &str = "Data_cleaned.csv";
pub const DEFAULT_DICTIONARY_PATH: &str = "Data_dictionary.csv";
pub const DEFAULT_TOKENIZED_PATH: &str = "Data_cleaned_and_tokenized.csv";
pub const DEFAULT_LOG_DIR: &str = "logs";

// Export layout
pub const METADATA_ROWS: usize = 2;
pub const IMPORT_ID_MARKER: &str = "ImportId";
pub const MAX_SLUG_LEN: usize = 60;
pub const LEADING_COLUMNS_DROPPED: usize = 4;
pub const DICTIONARY_ROWS_SKIPPED: usize = 25;
pub const TEXT_SUFFIX: &str = "_text";
pub const INDEX_COLUMN: &str = "index";
pub const DURATION_COLUMN: &str = "duration_secs";

// Quality thresholds
pub const BOT_SCORE_MIN: f64 = 0.30;
pub const MIN_DURATION_SECS: f64 = 10.0;
pub const NUMERIC_THRESHOLD: f64 = 0.6;

// Columns consulted by the row filters (post-rename short names)
pub const DUPLICATE_TEXT_COLUMN: &str = "qid48_text";
pub const DUPLICATE_FLAG_COLUMN: &str = "q_duplicaterespondent";
pub const STATUS_COLUMN: &str = "status";
pub const PREVIEW_STATUS: &str = "Survey Preview";
pub const BOT_SCORE_COLUMN: &str = "q_recaptchascore";

// Timestamp columns, resolved by flexible lookup
pub const START_DATE_COLUMN: &str = "StartDate";
pub const END_DATE_COLUMN: &str = "EndDate";
pub const RECORDED_DATE_COLUMN: &str = "RecordedDate";

/// Administrative, PII and metadata columns removed before analysis.
pub const DROP_COLUMNS: &[&str] = &[
    "Status",
    "IPAddress",
    "Progress",
    "Duration (in seconds)",
    "Finished",
    "RecordedDate",
    "ResponseId",
    "RecipientLastName",
    "RecipientFirstName",
    "RecipientEmail",
    "ExternalDataReference",
    "LocationLatitude",
    "LocationLongitude",
    "DistributionChannel",
    "UserLanguage",
    "QID47_Browser",
    "QID47_Version",
    "QID47_Operating System",
    "QID47_Resolution",
    "QID48",
    "Q_DuplicateRespondent",
    "StartDate",
    "EndDate",
    "Q_RecaptchaScore",
    "Q_BallotBoxStuffing",
    "Q_StraightliningQuestions",
    "Q_StraightliningPercentage",
    "Q_StraightliningCount",
];

/// Multi-word entities that must survive tokenization as a single token.
pub const MULTI_WORD_PHRASES: &[&str] = &[
    "cedar point",
    "ninja creami",
    "west side market",
    "little italy",
    "rock hall",
    "drone show",
    "ceramics class",
    "tous les jours",
    "paris baguette",
    "comedian show",
    "escape room",
    "air fryer",
    "food truck",
    "spring comedian",
    "severance hall",
    "cuyahoga valley national park",
    "hatch alarm clock",
    "free food",
    "thwing tuesday",
    "upbeat spring concert",
    "asian food",
    "jewelry making",
    "crepes n crisps",
    "cheesecake factory",
    "bombay chaat",
    "cilantro taqueria",
    "lao szechuan",
    "lunas bakery",
    "sweet spot",
    "bubble tea",
    "boba tea",
    "taiwanese food",
    "singaporean food",
    "thai food",
    "mediterranean food",
    "middle eastern food",
    "indian food",
    "korean food",
    "japanese food",
    "blue habanero",
    "chipotle mexican",
    "pacific east",
    "koko bakery",
    "indian flame",
    "citizen pie",
    "blue sky brews",
];
