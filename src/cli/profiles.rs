use std::fmt;

use anyhow::Result;
use rne_profiles::{DescriptorSummary, PageProfile, ProfileSummary};
use serde::Serialize;

use super::context::CliContext;

#[derive(Serialize)]
#[serde(transparent)]
pub struct ProfileListing(pub Vec<ProfileSummary>);

impl ProfileListing {
    pub fn collect() -> Result<Self> {
        let summaries = PageProfile::ALL
            .into_iter()
            .map(PageProfile::summary)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(summaries))
    }
}

fn write_level(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    descriptors: &[DescriptorSummary],
) -> fmt::Result {
    writeln!(f, "  {label}:")?;
    for descriptor in descriptors {
        let mut flags = Vec::new();
        if descriptor.unique {
            flags.push("unique");
        }
        if descriptor.subtree {
            flags.push("subtree");
        }
        write!(f, "    {:<20} {}", descriptor.name, descriptor.hint)?;
        if !flags.is_empty() {
            write!(f, " ({})", flags.join(", "))?;
        }
        writeln!(f)?;
    }
    Ok(())
}

impl fmt::Display for ProfileListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, profile) in self.0.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{} (anchor {})", profile.name, profile.anchor)?;
            write_level(f, "roots", &profile.roots)?;
            write_level(f, "streams", &profile.streams)?;
            write_level(f, "items", &profile.items)?;
        }
        Ok(())
    }
}

pub fn cmd_profiles(ctx: &CliContext) -> Result<()> {
    let listing = ProfileListing::collect()?;
    println!("{}", ctx.output().render(&listing)?.trim_end());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_shows_every_profile() {
        let listing = ProfileListing::collect().unwrap();
        let text = listing.to_string();
        assert!(text.contains("vanilla (anchor div#page-container)"));
        assert!(text.contains("tweetdeck (anchor div.application)"));
        assert!(text.contains("TIMELINE"));
        assert!(text.contains("(unique, subtree)"));
    }
}
