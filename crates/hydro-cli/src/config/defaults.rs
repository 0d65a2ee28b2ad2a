/// Values used when neither the command line nor the config file sets them.
pub struct DefaultsConfig {
    pub topology: String,
    pub coordinates: String,
    pub output_directory: String,
    pub platform: String,
    pub temperature: f64,
    pub friction: f64,
    pub timestep: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            topology: "inputs/water.prmtop".to_string(),
            coordinates: "inputs/water.inpcrd".to_string(),
            output_directory: "output".to_string(),
            platform: "auto".to_string(),
            temperature: 300.0,
            friction: 1.0,
            timestep: 0.002,
        }
    }
}
