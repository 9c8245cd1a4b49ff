use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

pub const USAGE: &str = "Usage: ripple-render [--config file.json] [--preset desktop|mobile] \
[--background img.png] [--size WxH] [--dpr R] [--frames N] [--out dir] [--no-float] \
[--save-config file.json]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Desktop,
    Mobile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub config: Option<PathBuf>,
    pub preset: Preset,
    pub background: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub frames: u32,
    pub out: PathBuf,
    /// Emulate a device without float color buffers.
    pub no_float: bool,
    pub save_config: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: None,
            preset: Preset::Desktop,
            background: None,
            width: 320,
            height: 180,
            pixel_ratio: 1.0,
            frames: 90,
            out: PathBuf::from("frames"),
            no_float: false,
            save_config: None,
        }
    }
}

/// `None` when help was requested.
pub fn parse(args: &[String]) -> Result<Option<Options>> {
    let mut opts = Options::default();
    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || take_value(args, &mut i, flag);
        match flag {
            "-h" | "--help" => return Ok(None),
            "--config" => opts.config = Some(PathBuf::from(value()?)),
            "--preset" => {
                opts.preset = match value()? {
                    "desktop" => Preset::Desktop,
                    "mobile" => Preset::Mobile,
                    other => bail!("unknown preset {:?}, expected desktop or mobile", other),
                }
            }
            "--background" => opts.background = Some(PathBuf::from(value()?)),
            "--size" => {
                let (w, h) = parse_size(value()?)?;
                opts.width = w;
                opts.height = h;
            }
            "--dpr" => {
                let raw = value()?;
                opts.pixel_ratio = raw.parse().with_context(|| format!("bad --dpr {:?}", raw))?;
                if opts.pixel_ratio <= 0.0 {
                    bail!("--dpr must be positive");
                }
            }
            "--frames" => {
                let raw = value()?;
                opts.frames = raw.parse().with_context(|| format!("bad --frames {:?}", raw))?;
            }
            "--out" => opts.out = PathBuf::from(value()?),
            "--no-float" => opts.no_float = true,
            "--save-config" => opts.save_config = Some(PathBuf::from(value()?)),
            other => bail!("unknown argument {:?}", other),
        }
        i += 1;
    }
    Ok(Some(opts))
}

fn take_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    args.get(*i).map(String::as_str).ok_or_else(|| anyhow!("{} needs a value", flag))
}

fn parse_size(raw: &str) -> Result<(u32, u32)> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("size {:?} is not WxH", raw))?;
    let w: u32 = w.trim().parse().with_context(|| format!("bad width in {:?}", raw))?;
    let h: u32 = h.trim().parse().with_context(|| format!("bad height in {:?}", raw))?;
    if w == 0 || h == 0 {
        bail!("size {:?} is empty", raw);
    }
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("ripple-render").chain(list.iter().copied()).map(String::from).collect()
    }

    #[test]
    fn test_defaults() {
        let opts = parse(&args(&[])).unwrap().unwrap();
        assert_eq!(opts, Options::default());
    }

    #[test]
    fn test_all_flags() {
        let opts = parse(&args(&[
            "--preset", "mobile", "--size", "64x48", "--dpr", "2", "--frames", "5", "--out", "tmp",
            "--no-float", "--config", "water.json", "--background", "bg.png",
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(opts.preset, Preset::Mobile);
        assert_eq!((opts.width, opts.height), (64, 48));
        assert_eq!(opts.pixel_ratio, 2.0);
        assert_eq!(opts.frames, 5);
        assert_eq!(opts.out, PathBuf::from("tmp"));
        assert!(opts.no_float);
        assert_eq!(opts.config, Some(PathBuf::from("water.json")));
        assert_eq!(opts.background, Some(PathBuf::from("bg.png")));
    }

    #[test]
    fn test_help() {
        assert!(parse(&args(&["--help"])).unwrap().is_none());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse(&args(&["--size", "64"])).is_err());
        assert!(parse(&args(&["--size", "0x10"])).is_err());
        assert!(parse(&args(&["--preset", "tablet"])).is_err());
        assert!(parse(&args(&["--frames"])).is_err());
        assert!(parse(&args(&["--dpr", "-1"])).is_err());
        assert!(parse(&args(&["--wat"])).is_err());
    }
}
