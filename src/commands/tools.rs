// src/commands/tools.rs

//! Path translation and digest conversion helpers

use anyhow::Result;
use vfsport::config::EngineConfig;
use vfsport::digest;
use vfsport::translator::{ResourceTranslator, RuleSpec};

/// Print how each path translates
///
/// Rules given on the command line are tried before the configured ones.
pub fn cmd_translate(config: &EngineConfig, paths: &[String], extra_rules: &[String]) -> Result<()> {
    let mut specs = extra_rules
        .iter()
        .map(|rule| RuleSpec::parse_sed(rule))
        .collect::<vfsport::Result<Vec<_>>>()?;
    specs.extend(config.translator()?.rules().iter().map(|rule| {
        RuleSpec::new(rule.pattern(), rule.replacement())
    }));
    let translator = ResourceTranslator::new(&specs)?;

    for path in paths {
        let translated = translator.translate(path);
        if translated == *path {
            println!("{}  (unchanged)", path);
        } else {
            println!("{} -> {}", path, translated);
        }
    }
    Ok(())
}

pub fn cmd_convert_digest(digests: &[String]) -> Result<()> {
    let mut failed = 0;
    for hex_digest in digests {
        match digest::convert(hex_digest) {
            Ok(converted) => println!("{} -> {}", hex_digest, converted),
            Err(e) => {
                eprintln!("{}: {}", hex_digest, e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{} digest(s) could not be converted", failed);
    }
    Ok(())
}
