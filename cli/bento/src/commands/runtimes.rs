//! `bento runtimes`: list the built-in runtimes.

use anyhow::Result;

pub fn run() -> Result<()> {
    print!("{}", render()?);
    Ok(())
}

pub fn render() -> Result<String> {
    let registry = bento_runtimes::registry()?;
    let mut out = String::new();
    for name in registry.names() {
        let runtime = registry.instantiate(name)?;
        let components = runtime.components();
        let components = if components.is_empty() {
            "(no components)".to_string()
        } else {
            components.join(", ")
        };
        out.push_str(&format!("  {name:<12} {components}\n"));
    }
    Ok(out)
}
