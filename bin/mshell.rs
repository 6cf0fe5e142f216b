fn main() {
    mshell::shell_main()
}
