use yansi::Paint;

pub fn pass(label: &str, detail: &str) {
    println!("{} {label} {}", "✓".green().bold(), detail.dim());
}

pub fn fail(label: &str, detail: &str) {
    println!("{} {label} {}", "✗".red().bold(), detail.red());
}

pub fn heading(text: &str) {
    println!("{}", text.bold());
}
