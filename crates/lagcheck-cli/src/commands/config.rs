use lagcheck_config::LoadConfig;

pub fn run(config: &LoadConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut effective = config.effective();
    if effective.store.password.is_some() {
        effective.store.password = Some("********".to_string());
    }

    // Print as YAML for readability
    let yaml = serde_yaml::to_string(&effective)?;
    println!("{}", yaml);

    for problem in config.validate() {
        eprintln!("warning: {}", problem);
    }

    Ok(())
}
