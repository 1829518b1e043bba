use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("PLANFORGE_API_KEY").or_else(|_| std::env::var("API_KEY"))
            && !key.is_empty()
        {
            self.model.api_key = Some(key);
        }

        if let Ok(model) = std::env::var("PLANFORGE_MODEL")
            && !model.is_empty()
        {
            self.model.model = model;
        }

        if let Ok(base_url) = std::env::var("PLANFORGE_BASE_URL")
            && !base_url.is_empty()
        {
            self.model.base_url = base_url;
        }

        if let Ok(temp_str) = std::env::var("PLANFORGE_TEMPERATURE")
            && let Ok(temp) = temp_str.parse::<f64>()
            && (0.0..=2.0).contains(&temp)
        {
            self.model.temperature = temp;
        }

        if let Ok(level) = std::env::var("PLANFORGE_LOG_LEVEL")
            && !level.is_empty()
        {
            self.observability.log_level = level;
        }
    }
}
