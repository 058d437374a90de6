mod poll_loop;
