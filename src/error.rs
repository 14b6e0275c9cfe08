#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration value `{field}` must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("configuration value `{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },
    #[error("root origin must be finite")]
    NonFiniteOrigin,
    #[error("at least one collision pass is required")]
    NoCollisionPasses,
    #[error("level spacing {level_spacing} must be at least node height plus gap ({required})")]
    LevelSpacingTooTight { level_spacing: f32, required: f32 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("equipment `{id}` not found in connection data")]
    NotFound { id: String },
    #[error("invalid layout configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
