fn main() {
    bracket_desk::run()
}
