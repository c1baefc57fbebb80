use fixre::limits::MAX_DEPTH_CEILING;
use fixre::{CompileError, CompileFlags, MatchOption, Program};
use log::{LevelFilter, debug, info};
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::process;

const VERSION: &str = concat!("fixre ", env!("CARGO_PKG_VERSION"));

/// Token capacity of the compiled pattern
const PROGRAM_CAPACITY: usize = 1024;

fn print_usage() {
    eprintln!("usage: fixre [options] pattern [file ...]");
    eprintln!("Available options are:");
    eprintln!("  -i        ignore ASCII case");
    eprintln!("  -o        print only the matched parts of a line");
    eprintln!("  -n        prefix each line with its line number");
    eprintln!("  -c        print only a count of matching lines");
    eprintln!("  -b steps  step budget for each match attempt");
    eprintln!("  -d depth  recursion depth budget (at most {})", MAX_DEPTH_CEILING);
    eprintln!("  --dump    print the compiled program and exit");
    eprintln!("  -V        more log output on stderr (repeatable)");
    eprintln!("  -v        show version information");
    eprintln!("  -h        show this help");
    eprintln!("  --        stop handling options");
    eprintln!("With no file, or when file is -, read standard input.");
}

fn print_version() {
    println!("{}", VERSION);
}

#[derive(Default)]
struct Options {
    case_insensitive: bool,
    only_matching: bool,
    line_numbers: bool,
    count_only: bool,
    step_budget: Option<usize>,
    max_depth: Option<usize>,
    dump: bool,
    verbosity: u8,
    show_help: bool,
    show_version: bool,
    pattern: Option<String>,
    files: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut opts = Options::default();
    let mut i = 1;
    let mut stop_options = false;

    while i < args.len() {
        let arg = &args[i];

        if !stop_options && arg.starts_with('-') && arg != "-" {
            match arg.as_str() {
                "-i" => opts.case_insensitive = true,
                "-o" => opts.only_matching = true,
                "-n" => opts.line_numbers = true,
                "-c" => opts.count_only = true,
                "-b" => {
                    i += 1;
                    let steps = args
                        .get(i)
                        .ok_or_else(|| "'-b' needs argument".to_string())?;
                    let steps = steps
                        .parse()
                        .map_err(|_| format!("invalid step budget '{}'", steps))?;
                    opts.step_budget = Some(steps);
                }
                "-d" => {
                    i += 1;
                    let depth = args
                        .get(i)
                        .ok_or_else(|| "'-d' needs argument".to_string())?;
                    let depth: usize = depth
                        .parse()
                        .map_err(|_| format!("invalid depth budget '{}'", depth))?;
                    if depth > MAX_DEPTH_CEILING {
                        return Err(format!(
                            "depth budget {} exceeds the limit of {}",
                            depth, MAX_DEPTH_CEILING
                        ));
                    }
                    opts.max_depth = Some(depth);
                }
                "--dump" => opts.dump = true,
                "-V" => opts.verbosity = opts.verbosity.saturating_add(1),
                "-v" => opts.show_version = true,
                "-h" | "--help" => opts.show_help = true,
                "--" => stop_options = true,
                _ => {
                    return Err(format!("unrecognized option '{}'", arg));
                }
            }
        } else if opts.pattern.is_none() {
            opts.pattern = Some(arg.clone());
        } else {
            opts.files.push(arg.clone());
        }
        i += 1;
    }

    Ok(opts)
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG still wins when set
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

#[cfg(feature = "serde")]
fn dump_program(program: &Program<PROGRAM_CAPACITY>) -> Result<(), String> {
    let json = serde_json::to_string_pretty(program.tokens())
        .map_err(|e| format!("cannot serialize program: {}", e))?;
    println!("{}", json);
    Ok(())
}

#[cfg(not(feature = "serde"))]
fn dump_program(program: &Program<PROGRAM_CAPACITY>) -> Result<(), String> {
    for (i, token) in program.tokens().iter().enumerate() {
        println!("{:4}  {:?}", i, token);
    }
    Ok(())
}

/// Per-run scanning state shared by all inputs
struct Scanner<'p, W: Write> {
    program: &'p Program<PROGRAM_CAPACITY>,
    options: MatchOption,
    out: W,
    only_matching: bool,
    line_numbers: bool,
    count_only: bool,
    show_names: bool,
}

impl<W: Write> Scanner<'_, W> {
    /// Scan one input; returns the number of matching lines.
    fn scan<R: BufRead>(&mut self, name: &str, mut input: R) -> io::Result<usize> {
        let mut line = Vec::new();
        let mut line_no = 0usize;
        let mut matched = 0usize;

        loop {
            line.clear();
            if input.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            line_no += 1;
            let text = trim_newline(&line);

            if self.scan_line(name, line_no, text)? {
                matched += 1;
            }
        }

        if self.count_only {
            if self.show_names {
                write!(self.out, "{}:", name)?;
            }
            let mut buf = itoa::Buffer::new();
            self.out.write_all(buf.format(matched).as_bytes())?;
            self.out.write_all(b"\n")?;
        }
        Ok(matched)
    }

    fn scan_line(&mut self, name: &str, line_no: usize, text: &[u8]) -> io::Result<bool> {
        if !self.only_matching {
            return match fixre::find(self.program.tokens(), text, 0, &mut [], &self.options) {
                Ok(Some(_)) => {
                    if !self.count_only {
                        self.write_prefix(name, line_no)?;
                        self.out.write_all(text)?;
                        self.out.write_all(b"\n")?;
                    }
                    Ok(true)
                }
                Ok(None) => Ok(false),
                Err(e) => {
                    eprintln!("fixre: {}:{}: {}", name, line_no, e);
                    Ok(false)
                }
            };
        }

        let program = self.program;
        let mut any = false;
        for found in program.find_iter(text, self.options) {
            let found = match found {
                Ok(found) => found,
                Err(e) => {
                    eprintln!("fixre: {}:{}: {}", name, line_no, e);
                    break;
                }
            };
            any = true;
            if self.count_only || found.is_empty() {
                continue;
            }
            self.write_prefix(name, line_no)?;
            self.out.write_all(found.as_bytes(text))?;
            self.out.write_all(b"\n")?;
        }
        Ok(any)
    }

    fn write_prefix(&mut self, name: &str, line_no: usize) -> io::Result<()> {
        if self.show_names {
            write!(self.out, "{}:", name)?;
        }
        if self.line_numbers {
            let mut buf = itoa::Buffer::new();
            self.out.write_all(buf.format(line_no).as_bytes())?;
            self.out.write_all(b":")?;
        }
        Ok(())
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn run(opts: Options) -> Result<bool, String> {
    let Some(pattern) = opts.pattern else {
        print_usage();
        return Err("no pattern given".to_string());
    };

    let mut flags = CompileFlags::NONE;
    if opts.case_insensitive {
        flags = flags.union(CompileFlags::CASE_INSENSITIVE);
    }
    let program = Program::<PROGRAM_CAPACITY>::compile(&pattern, flags).map_err(|e| match e {
        CompileError::CapacityTooSmall { required } => format!(
            "pattern too large ({} tokens, at most {} supported)",
            required, PROGRAM_CAPACITY
        ),
        e => format!("'{}': {}", pattern, e),
    })?;
    info!(
        "compiled {} byte pattern into {} tokens, {} capture groups",
        pattern.len(),
        program.len(),
        program.capture_count()
    );

    if opts.dump {
        dump_program(&program)?;
        return Ok(true);
    }

    let mut options = MatchOption::default();
    if let Some(steps) = opts.step_budget {
        options.step_budget = steps;
    }
    if let Some(depth) = opts.max_depth {
        options.max_depth = depth;
    }
    debug!("match options: {:?}", options);

    let stdout = io::stdout();
    let mut scanner = Scanner {
        program: &program,
        options,
        out: BufWriter::new(stdout.lock()),
        only_matching: opts.only_matching,
        line_numbers: opts.line_numbers,
        count_only: opts.count_only,
        show_names: opts.files.len() > 1,
    };

    let mut files = opts.files;
    if files.is_empty() {
        files.push("-".to_string());
    }

    let mut matched = 0usize;
    let mut failed = false;
    for name in &files {
        let result = if name == "-" {
            scanner.scan("(standard input)", io::stdin().lock())
        } else {
            match File::open(name) {
                Ok(file) => scanner.scan(name, BufReader::new(file)),
                Err(e) => Err(e),
            }
        };
        match result {
            Ok(n) => matched += n,
            Err(e) => {
                eprintln!("fixre: {}: {}", name, e);
                failed = true;
            }
        }
    }

    scanner
        .out
        .flush()
        .map_err(|e| format!("cannot write output: {}", e))?;

    if failed {
        return Err("some inputs could not be read".to_string());
    }
    Ok(matched > 0)
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("fixre: {}", e);
            print_usage();
            process::exit(2);
        }
    };

    if opts.show_help {
        print_usage();
        return;
    }
    if opts.show_version {
        print_version();
        return;
    }

    init_logger(opts.verbosity);

    match run(opts) {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("fixre: {}", e);
            process::exit(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, String> {
        let args: Vec<String> = std::iter::once("fixre")
            .chain(args.iter().copied())
            .map(String::from)
            .collect();
        parse_args(&args)
    }

    #[test]
    fn test_budget_options() {
        let opts = parse(&["-b", "5000", "-d", "300", "a+", "in.txt"]).unwrap();
        assert_eq!(opts.step_budget, Some(5000));
        assert_eq!(opts.max_depth, Some(300));
        assert_eq!(opts.pattern.as_deref(), Some("a+"));
        assert_eq!(opts.files, ["in.txt"]);
    }

    #[test]
    fn test_depth_option_is_bounded() {
        let max = MAX_DEPTH_CEILING.to_string();
        assert_eq!(parse(&["-d", max.as_str(), "x"]).unwrap().max_depth, Some(MAX_DEPTH_CEILING));

        let over = (MAX_DEPTH_CEILING + 1).to_string();
        assert!(parse(&["-d", over.as_str(), "x"]).is_err());
        assert!(parse(&["-d", "deep", "x"]).is_err());
        assert!(parse(&["-d"]).is_err());
    }

    #[test]
    fn test_options_after_double_dash() {
        let opts = parse(&["-i", "--", "-d", "file"]).unwrap();
        assert!(opts.case_insensitive);
        assert_eq!(opts.max_depth, None);
        assert_eq!(opts.pattern.as_deref(), Some("-d"));
        assert_eq!(opts.files, ["file"]);
    }
}
