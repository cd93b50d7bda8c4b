use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use coresort::{
    load_region, logger, parse_hex, read_words, run_all_cores, run_core, run_xor, to_hex,
    Region, SortImage, XorImage,
};
use coresort_runtime::layout::ensure_supported;
use coresort_runtime::{
    compute_layout, CoreIdentity, FixedCoreId, IdEncoding, SortOptions, MAX_SUPPORTED_CORES,
};
use std::fs;
use std::path::PathBuf;

/// coresort — per-core indirect sort over a partitioned shared region.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the partition a core-identification word resolves to
    Layout {
        /// Raw identification word (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_word)]
        core_id: u64,
        #[arg(long, value_enum, default_value_t = Encoding::Plain)]
        encoding: Encoding,
    },
    /// Build an image from value lists (one per core) and sort every core
    Sort {
        /// Comma-separated values for the next core, e.g. `5,3,1,4`
        #[arg(long = "values", value_parser = parse_values, required = true)]
        values: Vec<ValueList>,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Sort one core inside a raw region image file
    Run {
        /// Raw little-endian region image
        #[arg(long)]
        image: PathBuf,
        /// Raw identification word (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_word)]
        core_id: u64,
        #[command(flatten)]
        options: OptionArgs,
        /// Write the sorted image here
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// XOR data with a repeating key, given as hex or via an image frame
    #[command(group(ArgGroup::new("input").required(true).args(["data", "image"])))]
    Xor {
        /// Data bytes as hex
        #[arg(long, requires = "key", conflicts_with = "image")]
        data: Option<String>,
        /// Key bytes as hex
        #[arg(long)]
        key: Option<String>,
        /// Raw region image holding an XOR frame at 0x10
        #[arg(long)]
        image: Option<PathBuf>,
        /// Where to write the transformed image
        #[arg(long, short, requires = "image")]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct OptionArgs {
    #[arg(long, value_enum, default_value_t = Encoding::Plain)]
    encoding: Encoding,
    /// Number of partitions reserved in the region
    #[arg(long, default_value_t = MAX_SUPPORTED_CORES)]
    max_cores: usize,
}

impl OptionArgs {
    fn to_options(&self) -> SortOptions {
        SortOptions {
            encoding: self.encoding.into(),
            max_cores: self.max_cores,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Encoding {
    /// The word is the core index
    Plain,
    /// Low 16 bits index, high bits active-core count
    Packed,
}

impl From<Encoding> for IdEncoding {
    fn from(e: Encoding) -> Self {
        match e {
            Encoding::Plain => IdEncoding::PlainIndex,
            Encoding::Packed => IdEncoding::PackedIndexAndCount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ValueList(Vec<i64>);

fn parse_values(text: &str) -> Result<ValueList, String> {
    text.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().parse::<i64>().map_err(|e| format!("{s:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()
        .map(ValueList)
}

fn parse_word(text: &str) -> Result<u64, String> {
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("{text:?}: {e}"))
}

/// Human-readable partition of `identity`, flagging an unreserved index.
fn layout_lines(identity: CoreIdentity) -> Vec<String> {
    let p = compute_layout(identity);
    let mut lines = vec![format!("core index:    {}", identity.index)];
    if let Some(count) = identity.active_count {
        lines.push(format!("active cores:  {count}"));
    }
    lines.push(match ensure_supported(identity, MAX_SUPPORTED_CORES) {
        Ok(()) => "reserved:      yes".to_string(),
        Err(trap) => format!("reserved:      no ({trap})"),
    });
    lines.push(format!("stack base:    {:#06x}", p.stack_base));
    lines.push(format!("length ptr:    {:#06x}", p.length_ptr));
    lines.push(format!("indices slot:  {:#06x}", p.indices_slot));
    lines.push(format!("values slot:   {:#06x}", p.values_slot));
    lines
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    match cli.command {
        Command::Layout { core_id, encoding } => {
            let identity = CoreIdentity::decode(core_id, encoding.into());
            if let Err(trap) = ensure_supported(identity, MAX_SUPPORTED_CORES) {
                eprintln!("coresort: warning: {trap}; `run` would reject this core");
            }
            for line in layout_lines(identity) {
                println!("{line}");
            }
        }
        Command::Sort { values, options } => {
            let image = values
                .into_iter()
                .fold(SortImage::new(), |image, ValueList(v)| image.with_core(v));
            let mut region: Region = image.build().context("failed to build region image")?;
            let reports = run_all_cores(&mut region, image.core_count(), &options.to_options())?;
            for report in reports {
                let indices = read_words(&region, report.arrays.indices, report.arrays.len)?;
                let values = read_words(&region, report.arrays.values, report.arrays.len)?;
                let sorted: Vec<i64> = indices.iter().map(|&i| values[i as usize]).collect();
                println!(
                    "core {}: indices {:?} -> values {:?} ({} swaps)",
                    report.identity.index, indices, sorted, report.stats.swaps
                );
            }
        }
        Command::Run {
            image,
            core_id,
            options,
            output,
        } => {
            eprintln!("coresort: running core word {core_id:#x} on {}", image.display());
            let bytes =
                fs::read(&image).with_context(|| format!("failed to read {}", image.display()))?;
            let mut region = load_region(&bytes)?;
            let report = run_core(&mut region, &mut FixedCoreId(core_id), &options.to_options())?;
            let indices = read_words(&region, report.arrays.indices, report.arrays.len)?;
            println!("core {}: indices {:?}", report.identity.index, indices);
            if let Some(path) = output {
                fs::write(&path, &region.as_slice()[..bytes.len()])
                    .with_context(|| format!("failed to write {}", path.display()))?;
                eprintln!("coresort: wrote {}", path.display());
            }
        }
        Command::Xor {
            data,
            key,
            image,
            output,
        } => {
            if let Some(path) = image {
                let bytes = fs::read(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let mut region = load_region(&bytes)?;
                let frame = run_xor(&mut region)?;
                let out = region
                    .bytes(frame.data_ptr, frame.data_len as usize)
                    .context("xor data outside region")?;
                println!("{}", to_hex(out));
                if let Some(out_path) = output {
                    fs::write(&out_path, &region.as_slice()[..bytes.len()])
                        .with_context(|| format!("failed to write {}", out_path.display()))?;
                    eprintln!("coresort: wrote {}", out_path.display());
                }
            } else {
                let data = parse_hex(data.as_deref().unwrap_or_default())?;
                let key = parse_hex(key.as_deref().unwrap_or_default())?;
                let mut region: Region = XorImage { data, key }.build()?;
                let frame = run_xor(&mut region)?;
                let out = region
                    .bytes(frame.data_ptr, frame.data_len as usize)
                    .context("xor data outside region")?;
                println!("{}", to_hex(out));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_sort_with_two_cores() {
        let cli = Cli::parse_from([
            "coresort", "sort", "--values", "5,3,1,4", "--values", "1,2,3,4", "--encoding",
            "packed",
        ]);
        match cli.command {
            Command::Sort { values, options } => {
                assert_eq!(values.len(), 2);
                assert_eq!(values[0], ValueList(vec![5, 3, 1, 4]));
                assert_eq!(options.encoding, Encoding::Packed);
                assert_eq!(options.max_cores, MAX_SUPPORTED_CORES);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses_layout_hex_word() {
        let cli = Cli::parse_from(["coresort", "-vv", "layout", "--core-id", "0x0003_0002"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Layout { core_id, encoding } => {
                assert_eq!(core_id, 0x0003_0002);
                assert_eq!(encoding, Encoding::Plain);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn xor_data_requires_key() {
        assert!(Cli::try_parse_from(["coresort", "xor", "--data", "0102"]).is_err());
    }

    #[test]
    fn xor_requires_data_or_image() {
        let err = Cli::try_parse_from(["coresort", "xor"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert!(Cli::try_parse_from(["coresort", "xor", "--key", "42"]).is_err());
        assert!(Cli::try_parse_from(["coresort", "xor", "--data", "01", "--key", "42"]).is_ok());
        assert!(Cli::try_parse_from(["coresort", "xor", "--image", "region.bin"]).is_ok());
    }

    #[test]
    fn layout_flags_unreserved_core() {
        let reserved = layout_lines(CoreIdentity::decode(2, IdEncoding::PlainIndex));
        assert!(reserved.contains(&"reserved:      yes".to_string()));
        assert!(reserved.contains(&"stack base:    0x1e00".to_string()));

        let index = MAX_SUPPORTED_CORES as u64;
        let unreserved = layout_lines(CoreIdentity::decode(index, IdEncoding::PlainIndex));
        assert!(unreserved
            .iter()
            .any(|line| line.starts_with("reserved:      no") && line.contains("exceeds")));
    }

    #[test]
    fn parse_values_rejects_garbage() {
        assert!(parse_values("1,x").is_err());
        assert_eq!(parse_values("-1, 2,").unwrap(), ValueList(vec![-1, 2]));
    }
}
