pub struct DefaultsConfig {
    pub target: String,
    pub feature_kinds: Vec<String>,
    pub clean_zero: bool,
    pub standardize: bool,
    pub uncertainty: bool,
    pub test_fraction: f64,
    pub seed: u64,
    pub shuffle: bool,
    pub min_split: usize,
    pub neb_images: usize,
    pub spring_constant: f64,
    pub climbing_image: bool,
    pub fmax: f64,
    pub max_steps: usize,
    pub max_step_length: f64,
    pub neb_output: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            target: "energy".to_string(),
            feature_kinds: vec!["eigenspectrum".to_string()],
            clean_zero: true,
            standardize: true,
            uncertainty: true,
            test_fraction: 0.2,
            seed: 42,
            shuffle: true,
            min_split: 5,
            neb_images: 5,
            spring_constant: 0.1,
            climbing_image: false,
            fmax: 0.05,
            max_steps: 500,
            max_step_length: 0.2,
            neb_output: "neb-path.xyz".to_string(),
        }
    }
}
