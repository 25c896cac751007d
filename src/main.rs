use std::{
    fs::File,
    io::{self, BufRead, BufReader, Lines, Write},
};

use clap::Parser;
use vdisk::{
    cli_interface::{run_line, VdiskCli},
    Config, Context,
};

/// where commands come from
enum Input {
    Script(Lines<BufReader<File>>),
    /// read line by line so confirmations can share stdin
    Stdin,
}

impl Input {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        match self {
            Input::Script(lines) => lines.next().transpose(),
            Input::Stdin => {
                let mut line = String::new();
                if io::stdin().read_line(&mut line)? == 0 {
                    return Ok(None);
                }
                Ok(Some(line))
            }
        }
    }
}

/// ask a yes/no question on the terminal, anything but `y` is a no
fn ask(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().read_line(&mut answer) {
        Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
        Err(_) => false,
    }
}

/// a shell over simulated disks: every line of the script, or of stdin, is one command.
///
/// command errors are reported and the next line still runs
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = VdiskCli::parse();
    let mut context = Context::new(Config {
        disk_dir: args.disk_dir,
        id_suffix: args.id_suffix,
    });
    let mut input = match &args.script {
        Some(script) => Input::Script(BufReader::new(File::open(script)?).lines()),
        None => Input::Stdin,
    };
    let assume_yes = args.yes;
    let mut confirm = |prompt: &str| assume_yes || ask(prompt);

    while let Some(line) = input.next_line()? {
        match run_line(&mut context, &line, &mut confirm) {
            Ok(Some(output)) => println!("{output}"),
            Ok(None) => {
                if line.trim_start().starts_with('#') {
                    println!("{}", line.trim_end());
                }
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}
